use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderPaidEvent,
    PaymentFailedEvent,
    PayoutRequestedEvent,
    PayoutResolvedEvent,
    PremiumActivatedEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Publishing ends of the registered hooks. Cheap to clone; handed to every API object that emits events.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub premium_activated_producer: Vec<EventProducer<PremiumActivatedEvent>>,
    pub payment_failed_producer: Vec<EventProducer<PaymentFailedEvent>>,
    pub payout_requested_producer: Vec<EventProducer<PayoutRequestedEvent>>,
    pub payout_resolved_producer: Vec<EventProducer<PayoutResolvedEvent>>,
}

impl EventProducers {
    pub async fn publish_order_paid(&self, event: OrderPaidEvent) {
        for emitter in &self.order_paid_producer {
            debug!("📬️ Notifying order paid hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_premium_activated(&self, event: PremiumActivatedEvent) {
        for emitter in &self.premium_activated_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_payment_failed(&self, event: PaymentFailedEvent) {
        for emitter in &self.payment_failed_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_payout_requested(&self, event: PayoutRequestedEvent) {
        for emitter in &self.payout_requested_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_payout_resolved(&self, event: PayoutResolvedEvent) {
        for emitter in &self.payout_resolved_producer {
            emitter.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_premium_activated: Option<EventHandler<PremiumActivatedEvent>>,
    pub on_payment_failed: Option<EventHandler<PaymentFailedEvent>>,
    pub on_payout_requested: Option<EventHandler<PayoutRequestedEvent>>,
    pub on_payout_resolved: Option<EventHandler<PayoutResolvedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_paid: hooks.on_order_paid.map(|f| EventHandler::new(buffer_size, f)),
            on_premium_activated: hooks.on_premium_activated.map(|f| EventHandler::new(buffer_size, f)),
            on_payment_failed: hooks.on_payment_failed.map(|f| EventHandler::new(buffer_size, f)),
            on_payout_requested: hooks.on_payout_requested.map(|f| EventHandler::new(buffer_size, f)),
            on_payout_resolved: hooks.on_payout_resolved.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_premium_activated {
            result.premium_activated_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_failed {
            result.payment_failed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_requested {
            result.payout_requested_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_resolved {
            result.payout_resolved_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_premium_activated {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_failed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payout_requested {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payout_resolved {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_premium_activated: Option<Handler<PremiumActivatedEvent>>,
    pub on_payment_failed: Option<Handler<PaymentFailedEvent>>,
    pub on_payout_requested: Option<Handler<PayoutRequestedEvent>>,
    pub on_payout_resolved: Option<Handler<PayoutResolvedEvent>>,
}

impl EventHooks {
    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_premium_activated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PremiumActivatedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_premium_activated = Some(Arc::new(f));
        self
    }

    pub fn on_payment_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentFailedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payment_failed = Some(Arc::new(f));
        self
    }

    pub fn on_payout_requested<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutRequestedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payout_requested = Some(Arc::new(f));
        self
    }

    pub fn on_payout_resolved<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutResolvedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payout_resolved = Some(Arc::new(f));
        self
    }
}
