//! Disconnect-then-connect switching towards a desired topology.

use std::collections::HashSet;

use tracing::{debug, error, warn};

use crate::error::{ControllerError, ControllerResult};
use crate::ess::EssId;
use crate::points::{ContactorPort, ContactorState, Operation, PointRegistry};
use crate::topology::{Bus, Observation, Topology, TopologyCatalog};

/// One contactor command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCommand {
    pub contactor: ContactorPort,
    pub operation: Operation,
}

/// What a call to [`SwitchSequencer::apply`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchReport {
    /// Commands that reached the registry, in issue order.
    pub issued: Vec<SwitchCommand>,
    /// Commands whose write failed, and closes withheld because their bus or
    /// their ESS could not be cleared first.
    pub failed: Vec<SwitchCommand>,
}

impl SwitchReport {
    pub fn is_empty(&self) -> bool {
        self.issued.is_empty() && self.failed.is_empty()
    }
}

/// Opens and closes for one switching step. `withheld` holds the closes that
/// must not be sent.
#[derive(Debug, Default)]
struct Schedule {
    commands: Vec<SwitchCommand>,
    withheld: Vec<SwitchCommand>,
}

/// Buses and ESS that may still be joined by a contactor outside the target.
#[derive(Debug, Default)]
struct Uncleared<'a> {
    buses: HashSet<Bus>,
    units: HashSet<&'a EssId>,
}

impl<'a> Uncleared<'a> {
    fn mark(&mut self, contactor: &'a ContactorPort) {
        self.buses.insert(contactor.bus);
        self.units.insert(&contactor.ess);
    }

    fn blocks(&self, contactor: &ContactorPort) -> bool {
        self.buses.contains(&contactor.bus) || self.units.contains(&contactor.ess)
    }
}

/// Compares the desired topology with observed contactor states and issues
/// the commands that close the gap.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchSequencer;

impl SwitchSequencer {
    /// Computes the commands without writing anything.
    ///
    /// Returns no commands when `desired` is `Undefined` or already satisfied.
    /// Otherwise every non-target contactor that reads `Closed` is opened
    /// first, then every target contactor not yet `Closed` is closed.
    ///
    /// No close is planned onto a bus, or for an ESS, that still has a
    /// non-target contactor reading `Unknown`.
    ///
    /// # Errors
    ///
    /// Returns `IllegalTopology` if the closes would put two ESS on one bus or
    /// one ESS on both buses, or if a target contactor is not configured.
    pub fn plan(
        &self,
        catalog: &TopologyCatalog,
        desired: &Topology,
        observed: &Observation,
    ) -> ControllerResult<Vec<SwitchCommand>> {
        Ok(self.schedule(catalog, desired, observed)?.commands)
    }

    fn schedule(
        &self,
        catalog: &TopologyCatalog,
        desired: &Topology,
        observed: &Observation,
    ) -> ControllerResult<Schedule> {
        let Some(assignment) = desired.assignment() else {
            return Ok(Schedule::default());
        };
        if catalog.is_satisfied(desired, observed) {
            return Ok(Schedule::default());
        }

        let mut schedule = Schedule::default();
        let mut unknown = Uncleared::default();
        for c in catalog
            .contactors()
            .iter()
            .filter(|c| !assignment.connects(&c.ess, c.bus))
        {
            match observed.state(&c.ess, c.bus) {
                ContactorState::Closed => schedule.commands.push(SwitchCommand {
                    contactor: c.clone(),
                    operation: Operation::Open,
                }),
                ContactorState::Unknown => unknown.mark(c),
                ContactorState::Open => {}
            }
        }

        for (ess, bus) in assignment.pairs() {
            let contactor = catalog.contactor(ess, bus).ok_or_else(|| {
                ControllerError::illegal_topology(format!("no contactor joins {ess} to {bus}"))
            })?;
            if observed.state(ess, bus) == ContactorState::Closed {
                continue;
            }
            let command = SwitchCommand {
                contactor: contactor.clone(),
                operation: Operation::Close,
            };
            if unknown.blocks(contactor) {
                warn!(
                    %ess,
                    %bus,
                    "a contactor on this bus or ESS reads unknown, not closing [{}]",
                    contactor.address
                );
                schedule.withheld.push(command);
            } else {
                schedule.commands.push(command);
            }
        }

        check_closes(&schedule.commands)?;
        Ok(schedule)
    }

    /// Plans and writes the commands.
    ///
    /// A failed write is logged and recorded; unrelated commands are still
    /// issued. A close onto a bus, or for an ESS, whose open failed is not
    /// sent and is reported as failed.
    ///
    /// # Errors
    ///
    /// Propagates `IllegalTopology` from [`plan`](Self::plan); nothing is
    /// written in that case.
    pub fn apply<R: PointRegistry + ?Sized>(
        &self,
        registry: &mut R,
        catalog: &TopologyCatalog,
        desired: &Topology,
        observed: &Observation,
    ) -> ControllerResult<SwitchReport> {
        let Schedule { commands, withheld } = self.schedule(catalog, desired, observed)?;
        if commands.is_empty() && withheld.is_empty() {
            debug!(%desired, "contactors already match, nothing to switch");
        }

        let mut report = SwitchReport {
            issued: Vec::new(),
            failed: withheld,
        };
        let mut stuck = Uncleared::default();
        for command in &commands {
            let contactor = &command.contactor;
            if command.operation == Operation::Close && stuck.blocks(contactor) {
                error!(
                    ess = %contactor.ess,
                    bus = %contactor.bus,
                    "open failed on the same bus or ESS, not closing [{}]",
                    contactor.address
                );
                report.failed.push(command.clone());
                continue;
            }
            match contactor.command(registry, command.operation) {
                Ok(()) => report.issued.push(command.clone()),
                Err(err) => {
                    error!(
                        ess = %contactor.ess,
                        bus = %contactor.bus,
                        "unable to set output [{}]: {err}",
                        contactor.address
                    );
                    if command.operation == Operation::Open {
                        stuck.mark(contactor);
                    }
                    report.failed.push(command.clone());
                }
            }
        }
        Ok(report)
    }
}

fn check_closes(commands: &[SwitchCommand]) -> ControllerResult<()> {
    let mut buses = HashSet::new();
    let mut units = HashSet::new();
    for command in commands.iter().filter(|c| c.operation == Operation::Close) {
        let c = &command.contactor;
        if !buses.insert(c.bus) {
            return Err(ControllerError::illegal_topology(format!(
                "two ESS would be closed onto {}",
                c.bus
            )));
        }
        if !units.insert(&c.ess) {
            return Err(ControllerError::illegal_topology(format!(
                "{} would be closed onto both buses",
                c.ess
            )));
        }
    }
    Ok(())
}
