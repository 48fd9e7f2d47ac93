//! Heartbeat scheduler
//!
//! The single entry point the surrounding environment drives once per tick.
//! A bounded ordered registry of driven components is invoked in
//! registration order, each within an explicit resource budget and behind a
//! panic recovery boundary. A component that errors, exhausts its budget or
//! panics is recorded and held off for a configurable number of ticks; it
//! never prevents the components after it from running in the same tick.

pub mod errors;
pub mod mint;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::config::{MintConfig, SchedulerConfig};
use crate::error::SchedulerError;
use crate::event::Event;
use crate::governance::Governed;
use crate::types::{Amount, Meter, TickContext, VoterId};

use errors::{ErrorLog, ErrorRecord};
use mint::{MintReceiver, MintReconciler, Reconciliation};

/// A unit of logic invoked once per tick
pub trait Driven: Send {
    fn drive(&mut self, ctx: &mut TickContext) -> anyhow::Result<()>;
}

/// Shared handle to a driven component
pub type DrivenHandle = Arc<Mutex<dyn Driven>>;

struct Registration {
    identity: String,
    ceiling: u64,
    holdoff_remaining: u64,
    component: DrivenHandle,
}

pub struct Scheduler {
    cfg: SchedulerConfig,
    governance: Governed,
    trigger: VoterId,
    mint_requester: VoterId,
    registry: Vec<Registration>,
    last_tick: Option<u64>,
    error_log: ErrorLog,
    mint: MintReconciler,
    receiver: Option<Box<dyn MintReceiver>>,
    events: Vec<Event>,
}

impl Scheduler {
    pub fn new(
        cfg: SchedulerConfig,
        mint_cfg: &MintConfig,
        governance_owner: VoterId,
        trigger: VoterId,
        mint_requester: VoterId,
    ) -> Self {
        let error_log = ErrorLog::new(cfg.error_history);
        let mint = MintReconciler::new(mint_cfg);
        Self {
            cfg,
            governance: Governed::new(governance_owner),
            trigger,
            mint_requester,
            registry: Vec::new(),
            last_tick: None,
            error_log,
            mint,
            receiver: None,
            events: Vec::new(),
        }
    }

    pub fn governance(&mut self) -> &mut Governed {
        &mut self.governance
    }

    pub fn set_mint_receiver(&mut self, receiver: Box<dyn MintReceiver>) {
        self.receiver = Some(receiver);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // --- registration -------------------------------------------------------

    pub fn register(
        &mut self,
        caller: VoterId,
        identity: &str,
        ceiling: u64,
        component: DrivenHandle,
    ) -> Result<(), SchedulerError> {
        self.governance
            .require_owner(caller)
            .map_err(|_| SchedulerError::Unauthorized)?;
        if self.registry.iter().any(|r| r.identity == identity) {
            return Err(SchedulerError::DuplicateComponent(identity.to_string()));
        }
        if self.registry.len() >= self.cfg.max_components {
            return Err(SchedulerError::RegistryFull);
        }
        self.registry.push(Registration {
            identity: identity.to_string(),
            ceiling,
            holdoff_remaining: 0,
            component,
        });
        info!(identity, ceiling, "component registered");
        self.events.push(Event::RegistrationChanged {
            identity: identity.to_string(),
            added: true,
        });
        Ok(())
    }

    pub fn unregister(&mut self, caller: VoterId, identity: &str) -> Result<(), SchedulerError> {
        self.governance
            .require_owner(caller)
            .map_err(|_| SchedulerError::Unauthorized)?;
        let before = self.registry.len();
        self.registry.retain(|r| r.identity != identity);
        if self.registry.len() == before {
            return Err(SchedulerError::ComponentNotFound(identity.to_string()));
        }
        info!(identity, "component unregistered");
        self.events.push(Event::RegistrationChanged {
            identity: identity.to_string(),
            added: false,
        });
        Ok(())
    }

    pub fn unregister_all(&mut self, caller: VoterId) -> Result<(), SchedulerError> {
        self.governance
            .require_owner(caller)
            .map_err(|_| SchedulerError::Unauthorized)?;
        for r in self.registry.drain(..) {
            self.events.push(Event::RegistrationChanged {
                identity: r.identity,
                added: false,
            });
        }
        Ok(())
    }

    /// (identity, ceiling, holdoff_remaining) per registration, in order
    pub fn registrations(&self) -> Vec<(String, u64, u64)> {
        self.registry
            .iter()
            .map(|r| (r.identity.clone(), r.ceiling, r.holdoff_remaining))
            .collect()
    }

    // --- driving ------------------------------------------------------------

    /// Drive every non-held-off component once, in registration order
    ///
    /// Fails only on authorization or sequencing; faults inside components
    /// are absorbed into the error log and holdoff.
    pub fn tick(
        &mut self,
        caller: VoterId,
        tick: u64,
        timestamp: i64,
        block: u64,
    ) -> Result<(), SchedulerError> {
        if caller != self.trigger {
            return Err(SchedulerError::Unauthorized);
        }
        if let Some(last) = self.last_tick {
            if tick <= last {
                return Err(SchedulerError::AlreadyTriggered(tick));
            }
        }
        self.last_tick = Some(tick);
        debug!(tick, timestamp, block, "tick");

        for i in 0..self.registry.len() {
            if self.registry[i].holdoff_remaining > 0 {
                self.registry[i].holdoff_remaining -= 1;
                let remaining = self.registry[i].holdoff_remaining;
                let identity = self.registry[i].identity.clone();
                debug!(identity = %identity, remaining, "component held off");
                self.events.push(Event::ComponentHeldOff { identity, remaining });
                continue;
            }

            let ceiling = match self.registry[i].ceiling {
                0 => self.cfg.default_ceiling,
                c => c,
            };
            let component = Arc::clone(&self.registry[i].component);
            let mut ctx = TickContext {
                tick,
                timestamp,
                block,
                meter: Meter::new(ceiling),
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut guard = component
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                guard.drive(&mut ctx)
            }));

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => self.fault(i, &err.to_string(), tick),
                Err(payload) => self.fault(i, &panic_message(payload.as_ref()), tick),
            }
        }
        Ok(())
    }

    fn fault(&mut self, index: usize, message: &str, tick: u64) {
        let identity = self.registry[index].identity.clone();
        warn!(identity = %identity, message, tick, "component faulted");
        self.error_log.record(&identity, message, tick);
        self.registry[index].holdoff_remaining = self.cfg.holdoff_ticks;
        self.events.push(Event::ComponentFaulted {
            identity,
            message: message.chars().take(errors::MAX_ERROR_MESSAGE_LEN).collect(),
            tick,
        });
    }

    // --- diagnostics --------------------------------------------------------

    pub fn last_error(&self) -> Option<ErrorRecord> {
        self.error_log.last_error().cloned()
    }

    pub fn errors(&self, start: usize, count: usize) -> Result<Vec<ErrorRecord>, SchedulerError> {
        self.error_log.page(start, count)
    }

    pub fn total_errors(&self) -> u64 {
        self.error_log.total()
    }

    // --- mint reconciliation ------------------------------------------------

    pub fn request_minting(
        &mut self,
        caller: VoterId,
        amount: Amount,
        now: i64,
    ) -> Result<(), SchedulerError> {
        if caller != self.mint_requester {
            return Err(SchedulerError::Unauthorized);
        }
        self.mint.request(amount, now)?;
        info!(amount, "minting requested");
        self.events.push(Event::MintRequested { amount });
        Ok(())
    }

    pub fn set_max_minting_request(
        &mut self,
        caller: VoterId,
        new_cap: Amount,
        now: i64,
    ) -> Result<(), SchedulerError> {
        self.governance
            .require_owner(caller)
            .map_err(|_| SchedulerError::Unauthorized)?;
        self.mint.set_max_request(new_cap, now)
    }

    /// Reconcile inbound native funds against the outstanding request
    pub fn receive_funds(&mut self, amount: Amount) -> Reconciliation {
        let mut null_sink = NullReceiver;
        let receiver: &mut dyn MintReceiver = match self.receiver.as_deref_mut() {
            Some(r) => r,
            None => &mut null_sink,
        };
        let result = self.mint.receive(amount, receiver);
        if result.forwarded > 0 {
            self.events.push(Event::MintForwarded {
                amount: result.forwarded,
            });
        }
        if result.surplus > 0 {
            self.events.push(Event::UnexplainedReceipt {
                amount: result.surplus,
                total: self.mint.unexplained_receipts(),
            });
        }
        result
    }

    pub fn outstanding_mint_request(&self) -> Amount {
        self.mint.outstanding()
    }

    pub fn unexplained_receipts(&self) -> Amount {
        self.mint.unexplained_receipts()
    }
}

struct NullReceiver;
impl MintReceiver for NullReceiver {
    fn receive(&mut self, _amount: Amount) {}
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "component panicked".to_string()
    }
}
