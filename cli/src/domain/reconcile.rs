//! Reconciliation planner — decides the next corrective action from one
//! observation of the instance.
//!
//! The planner is synchronous and owns all idempotency bookkeeping. The
//! async polling loop lives in `application::services::reconcile`; it feeds
//! each fresh snapshot to [`Planner::observe`], executes whatever
//! [`Step::Issue`] asks for, and reports the result back through
//! [`Planner::record`].
//!
//! A transition request is issued at most once per distinct *trigger*
//! observation (absent, or status + whether an address is assigned). While
//! the same trigger keeps being observed the planner waits; when the
//! observation changes, the request may be issued again. Create, delete and
//! reboot are stricter: once accepted they are never issued again in that run.

use std::fmt;

use super::error::ReconcileError;
use super::instance::{DesiredState, Instance, InstanceStatus, Locator};

/// Consecutive `Running` polls after an accepted reboot that are taken as
/// "the reboot finished between two polls".
pub const REBOOT_GRACE_POLLS: u32 = 10;

/// Consecutive absent polls a reboot tolerates before giving up on the
/// instance. Listings lag behind the control plane.
pub const MISSING_POLLS: u32 = 3;

/// A state transition request against the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create the instance (network prerequisites are ensured first).
    Create,
    Start { id: String },
    Stop { id: String },
    Reboot { id: String },
    Delete { id: String },
    AllocateAddress { id: String },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create instance"),
            Self::Start { id } => write!(f, "start {id}"),
            Self::Stop { id } => write!(f, "stop {id}"),
            Self::Reboot { id } => write!(f, "reboot {id}"),
            Self::Delete { id } => write!(f, "delete {id}"),
            Self::AllocateAddress { id } => write!(f, "allocate public address for {id}"),
        }
    }
}

/// Why the planner is waiting this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    CreationRequested,
    StartRequested,
    StopRequested,
    AddressRequested,
    Starting,
    Stopping,
    UnknownStatus,
    Deleting,
    Rebooting,
    Lookup,
}

impl fmt::Display for WaitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CreationRequested => "instance creation requested, waiting for it to show up",
            Self::StartRequested => "start requested, waiting for instance to leave Stopped",
            Self::StopRequested => "stop requested, waiting for instance to leave Running",
            Self::AddressRequested => "public address requested, waiting for it to be assigned",
            Self::Starting => "instance is being started up",
            Self::Stopping => "instance is being stopped",
            Self::UnknownStatus => "instance is in a transitional state",
            Self::Deleting => "instance is being deleted",
            Self::Rebooting => "instance is rebooting",
            Self::Lookup => "instance not listed yet, looking again",
        };
        f.write_str(s)
    }
}

/// Terminal success of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Running with a public address. `created` is set when this run created it.
    Up { address: String, created: bool },
    /// Stopped, or nothing to stop when `found` is false.
    Down { found: bool },
    /// Gone, or nothing to delete when `found` is false.
    Deleted { found: bool },
    Rebooted { address: Option<String> },
}

/// What the polling loop should do after an observation.
#[derive(Debug)]
pub enum Step {
    Issue(Action),
    Wait(WaitReason),
    Done(Outcome),
    Fail(ReconcileError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Absent,
    Present {
        status: InstanceStatus,
        has_address: bool,
    },
}

impl Trigger {
    fn of(observed: Option<&Instance>) -> Self {
        observed.map_or(Self::Absent, |i| Self::Present {
            status: i.status,
            has_address: i.address().is_some(),
        })
    }
}

/// Per-run reconciliation state.
#[derive(Debug)]
pub struct Planner {
    desired: DesiredState,
    locator: String,
    pending: Option<(Action, Trigger)>,
    seen: bool,
    created: bool,
    delete_issued: bool,
    reboot_issued: bool,
    left_running: bool,
    running_polls: u32,
    missing_polls: u32,
}

impl Planner {
    #[must_use]
    pub fn new(desired: DesiredState, locator: &Locator) -> Self {
        Self {
            desired,
            locator: locator.to_string(),
            pending: None,
            seen: false,
            created: false,
            delete_issued: false,
            reboot_issued: false,
            left_running: false,
            running_polls: 0,
            missing_polls: 0,
        }
    }

    /// Decide the next step from a fresh snapshot (`None` = absent).
    pub fn observe(&mut self, observed: Option<&Instance>) -> Step {
        let trigger = Trigger::of(observed);
        if self.pending.as_ref().is_some_and(|(_, t)| *t != trigger) {
            self.pending = None;
        }
        if observed.is_some() {
            self.seen = true;
        }
        match self.desired {
            DesiredState::Up => self.plan_up(observed, trigger),
            DesiredState::Down => self.plan_down(observed, trigger),
            DesiredState::Deleted => self.plan_delete(observed),
            DesiredState::Rebooted => self.plan_reboot(observed),
        }
    }

    /// Report whether the provider accepted `action`.
    ///
    /// A rejected request is forgotten so the next tick may issue it again.
    pub fn record(&mut self, action: &Action, accepted: bool) {
        if accepted {
            if *action == Action::Create {
                self.created = true;
            }
            return;
        }
        self.pending = None;
        match action {
            Action::Delete { .. } => self.delete_issued = false,
            Action::Reboot { .. } => self.reboot_issued = false,
            _ => {}
        }
    }

    fn request(&mut self, action: Action, trigger: Trigger, waiting: WaitReason) -> Step {
        if self.pending.is_some() {
            return Step::Wait(waiting);
        }
        self.pending = Some((action.clone(), trigger));
        Step::Issue(action)
    }

    fn plan_up(&mut self, observed: Option<&Instance>, trigger: Trigger) -> Step {
        let Some(instance) = observed else {
            if self.created {
                return Step::Wait(WaitReason::CreationRequested);
            }
            return self.request(Action::Create, trigger, WaitReason::CreationRequested);
        };
        let id = instance.id.clone();
        match instance.status {
            InstanceStatus::Running => match instance.address() {
                Some(address) => Step::Done(Outcome::Up {
                    address: address.to_string(),
                    created: self.created,
                }),
                None => self.request(
                    Action::AllocateAddress { id },
                    trigger,
                    WaitReason::AddressRequested,
                ),
            },
            InstanceStatus::Stopped => {
                self.request(Action::Start { id }, trigger, WaitReason::StartRequested)
            }
            InstanceStatus::Starting => Step::Wait(WaitReason::Starting),
            InstanceStatus::Stopping => Step::Wait(WaitReason::Stopping),
            InstanceStatus::Unknown => Step::Wait(WaitReason::UnknownStatus),
        }
    }

    fn plan_down(&mut self, observed: Option<&Instance>, trigger: Trigger) -> Step {
        let Some(instance) = observed else {
            return Step::Done(Outcome::Down { found: self.seen });
        };
        match instance.status {
            InstanceStatus::Running => self.request(
                Action::Stop {
                    id: instance.id.clone(),
                },
                trigger,
                WaitReason::StopRequested,
            ),
            InstanceStatus::Stopped => Step::Done(Outcome::Down { found: true }),
            InstanceStatus::Starting => Step::Wait(WaitReason::Starting),
            InstanceStatus::Stopping => Step::Wait(WaitReason::Stopping),
            InstanceStatus::Unknown => Step::Wait(WaitReason::UnknownStatus),
        }
    }

    fn plan_delete(&mut self, observed: Option<&Instance>) -> Step {
        if self.delete_issued {
            return match observed {
                None => Step::Done(Outcome::Deleted { found: true }),
                Some(_) => Step::Wait(WaitReason::Deleting),
            };
        }
        match observed {
            None => Step::Done(Outcome::Deleted { found: self.seen }),
            Some(instance) if instance.status != InstanceStatus::Stopped => {
                Step::Fail(ReconcileError::InvalidState {
                    desired: DesiredState::Deleted,
                    status: instance.status,
                })
            }
            Some(instance) => {
                self.delete_issued = true;
                Step::Issue(Action::Delete {
                    id: instance.id.clone(),
                })
            }
        }
    }

    fn plan_reboot(&mut self, observed: Option<&Instance>) -> Step {
        if observed.is_none() {
            self.missing_polls += 1;
            if self.missing_polls < MISSING_POLLS {
                return Step::Wait(WaitReason::Lookup);
            }
        } else {
            self.missing_polls = 0;
        }
        if !self.reboot_issued {
            return match observed {
                None => Step::Fail(ReconcileError::NotFound {
                    locator: self.locator.clone(),
                }),
                Some(instance) if instance.status == InstanceStatus::Stopped => {
                    Step::Fail(ReconcileError::InvalidState {
                        desired: DesiredState::Rebooted,
                        status: instance.status,
                    })
                }
                Some(instance) => {
                    self.reboot_issued = true;
                    Step::Issue(Action::Reboot {
                        id: instance.id.clone(),
                    })
                }
            };
        }
        let Some(instance) = observed else {
            return Step::Fail(ReconcileError::Vanished {
                locator: self.locator.clone(),
            });
        };
        if instance.status != InstanceStatus::Running {
            self.left_running = true;
            self.running_polls = 0;
            return Step::Wait(WaitReason::Rebooting);
        }
        self.running_polls += 1;
        if self.left_running || self.running_polls >= REBOOT_GRACE_POLLS {
            Step::Done(Outcome::Rebooted {
                address: instance.address().map(String::from),
            })
        } else {
            Step::Wait(WaitReason::Rebooting)
        }
    }
}
