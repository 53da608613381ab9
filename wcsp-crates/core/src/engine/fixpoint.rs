//! The scheduler which drains the event queues until nothing changes any more.
use log::trace;

use super::ConsistencyLevel;
use super::PropagationContext;
use super::QueueKind;
use crate::basic_types::PropagationStatus;
use crate::cost_functions::CostFunctionId;

impl PropagationContext<'_> {
    /// Propagates the cost functions in `pending` from scratch, and then every queued event.
    ///
    /// Assignments are handled after every single event of the other queues, existential arc
    /// consistency only while the bounds leave room for it, dominance only once everything else
    /// is quiet, and elimination only at the very end.
    pub(crate) fn propagate_to_fixed_point(&mut self, pending: &[CostFunctionId]) -> PropagationStatus {
        self.statistics.num_fixpoint_calls += 1;
        for &cost_function in pending {
            self.propagate_cost_function(cost_function)?;
        }

        loop {
            self.propagate_queues()?;
            if self.queues.get(QueueKind::Eliminate).is_empty() {
                break;
            }
            while let Some(variable) = self.queues.pop(QueueKind::Eliminate) {
                self.statistics.num_eliminate_events += 1;
                self.eliminate(variable)?;
            }
        }

        if self.options.full_eac {
            self.revise_full_eac();
        }
        trace!("fixpoint reached with lower bound {}", self.lower_bound());
        Ok(())
    }

    fn has_pending_events(&self) -> bool {
        self.bounds.objective_changed
            || [
                QueueKind::Assign,
                QueueKind::Nc,
                QueueKind::Ac,
                QueueKind::Dac,
                QueueKind::Eac1,
                QueueKind::Eac2,
            ]
            .into_iter()
            .any(|kind| !self.queues.get(kind).is_empty())
    }

    fn propagate_queues(&mut self) -> PropagationStatus {
        loop {
            while self.has_pending_events() {
                self.process_assignments()?;
                self.propagate_existential_queues()?;

                while let Some(variable) = self.queues.pop(QueueKind::Dac) {
                    self.statistics.num_dac_events += 1;
                    self.propagate_dac(variable)?;
                    self.process_assignments()?;
                }
                while let Some(variable) = self.queues.pop(QueueKind::Ac) {
                    self.statistics.num_ac_events += 1;
                    self.propagate_ac(variable)?;
                    self.process_assignments()?;
                }

                if self.bounds.objective_changed {
                    self.bounds.objective_changed = false;
                    self.enqueue_forbidden_maxima();
                }
                while let Some(variable) = self.queues.pop(QueueKind::Nc) {
                    self.statistics.num_nc_events += 1;
                    self.propagate_nc(variable)?;
                }
            }

            if self.queues.get(QueueKind::Dee).is_empty() {
                return Ok(());
            }
            while let Some(variable) = self.queues.pop(QueueKind::Dee) {
                self.statistics.num_dee_events += 1;
                self.propagate_dee(variable)?;
            }
        }
    }

    /// Tells the cost functions of every assigned variable about its assignment.
    fn process_assignments(&mut self) -> PropagationStatus {
        while let Some(variable) = self.queues.pop(QueueKind::Assign) {
            self.statistics.num_assign_events += 1;
            for link in self.variable(variable).links.iter() {
                self.on_assignment(link.cost_function)?;
            }
        }
        Ok(())
    }

    fn propagate_existential_queues(&mut self) -> PropagationStatus {
        if self.options.consistency != ConsistencyLevel::ExistentialDirectionalArc
            || self.lower_bound() + 1 >= self.upper_bound()
        {
            self.queues.get_mut(QueueKind::Eac1).clear();
            self.queues.get_mut(QueueKind::Eac2).clear();
            return Ok(());
        }

        while let Some(variable) = self.queues.pop(QueueKind::Eac1) {
            self.fill_existential_queues(variable, true);
        }
        while let Some(variable) = self.queues.pop(QueueKind::Eac2) {
            self.statistics.num_eac_events += 1;
            self.propagate_eac(variable)?;
            self.process_assignments()?;
        }
        Ok(())
    }

    /// After the bounds moved, the variables whose worst value may have become forbidden need
    /// node consistency again.
    fn enqueue_forbidden_maxima(&mut self) {
        let variables = self.variables;
        for variable in variables.keys() {
            let cells = self.cells(variable);
            if !cells.is_assigned(self.trailed_values)
                && !cells.is_eliminated(self.trailed_values)
                && self.is_forbidden(cells.max_cost(self.trailed_values))
            {
                self.enqueue(QueueKind::Nc, variable);
            }
        }
    }
}
