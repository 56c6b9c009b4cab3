//! Purchase operations.
//!
//! Both operations run the same pipeline: validate without locks, lock every
//! row in global order, recheck against the locked rows, then write and
//! commit. A multi-seller purchase is one unit of work, so it commits every
//! line or none.

use phantom_core::{
    BuyerId, Deadline, Decimal, MultiPurchaseReceipt, MultiPurchaseRequest, PurchaseLine,
    PurchaseRecord, PurchaseRequest,
};
use phantom_store::{LedgerStore, UnitOfWork};

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::flow::{Flow, PurchasePhase};
use crate::lock::{self, LockPlan};
use crate::validate::{self, ValidatedItem};
use crate::{classify, commit};

impl<S: LedgerStore> Engine<S> {
    /// Buy one product from one seller.
    ///
    /// Uses the configured request deadline.
    ///
    /// # Errors
    ///
    /// See [`Engine::purchase_single_until`].
    pub fn purchase_single(&self, request: PurchaseRequest) -> Result<PurchaseRecord> {
        self.purchase_single_until(request, self.config().deadline())
    }

    /// Buy one product from one seller, giving up at `deadline`.
    ///
    /// # Errors
    ///
    /// - Not found: buyer, seller, or product (including a product listed by
    ///   another seller).
    /// - Business rule: zero quantity, insufficient stock or balance.
    /// - Transient conflict: lock timeout, deadlock, or deadline exceeded.
    /// - Internal: any other store failure.
    pub fn purchase_single_until(
        &self,
        request: PurchaseRequest,
        deadline: Deadline,
    ) -> Result<PurchaseRecord> {
        let mut flow = Flow::start("purchase_single", deadline);
        let result = self
            .purchase_lines(&mut flow, request.buyer_id, &[request.line()])
            .and_then(|(mut records, _)| {
                records
                    .pop()
                    .ok_or_else(|| EngineError::Internal("commit produced no record".into()))
            });
        let record = flow.finish(result)?;

        tracing::info!(
            purchase_id = %record.id,
            buyer_id = %record.buyer_id,
            seller_id = %record.seller_id,
            product_id = %record.product_id,
            quantity = record.quantity,
            total = %record.total_amount,
            "Purchase committed"
        );
        Ok(record)
    }

    /// Buy several lines, possibly from several sellers, all or nothing.
    ///
    /// Uses the configured request deadline.
    ///
    /// # Errors
    ///
    /// See [`Engine::purchase_multi_until`].
    pub fn purchase_multi(&self, request: &MultiPurchaseRequest) -> Result<MultiPurchaseReceipt> {
        self.purchase_multi_until(request, self.config().deadline())
    }

    /// Buy several lines all or nothing, giving up at `deadline`.
    ///
    /// The buyer is charged once with the sum of all lines. Lines naming the
    /// same product are checked against its stock together.
    ///
    /// # Errors
    ///
    /// As [`Engine::purchase_single_until`], plus
    /// [`EngineError::EmptyPurchase`]. The error describes the first failing
    /// line; no line is committed.
    pub fn purchase_multi_until(
        &self,
        request: &MultiPurchaseRequest,
        deadline: Deadline,
    ) -> Result<MultiPurchaseReceipt> {
        let mut flow = Flow::start("purchase_multi", deadline);
        let result = self.purchase_lines(&mut flow, request.buyer_id, &request.items);
        let (records, total_amount) = flow.finish(result)?;

        tracing::info!(
            buyer_id = %request.buyer_id,
            lines = records.len(),
            total = %total_amount,
            "Multi-seller purchase committed"
        );
        Ok(MultiPurchaseReceipt {
            buyer_id: request.buyer_id,
            records,
            total_amount,
        })
    }

    /// Run only the validation stage and roll back.
    ///
    /// Never changes stored state, however often it is called.
    ///
    /// # Errors
    ///
    /// The not-found and business rule errors of
    /// [`Engine::purchase_single_until`].
    pub fn validate(&self, request: PurchaseRequest) -> Result<ValidatedItem> {
        self.validate_until(request, self.config().deadline())
    }

    /// [`Engine::validate`], refusing to start after `deadline`.
    ///
    /// # Errors
    ///
    /// As [`Engine::validate`], plus [`EngineError::DeadlineExceeded`].
    pub fn validate_until(
        &self,
        request: PurchaseRequest,
        deadline: Deadline,
    ) -> Result<ValidatedItem> {
        if deadline.is_expired() {
            return Err(EngineError::DeadlineExceeded {
                phase: PurchasePhase::Validating,
            });
        }

        let unit = self.store().begin(deadline.clamp(self.config().lock_timeout))?;
        let result = validate::find_buyer(&unit, request.buyer_id)
            .and_then(|buyer| validate::validate_line(&unit, &buyer, request.line()));
        match &result {
            Ok(_) => unit.rollback()?,
            Err(err) => classify::abandon(unit, err),
        }
        result
    }

    fn purchase_lines(
        &self,
        flow: &mut Flow,
        buyer_id: BuyerId,
        lines: &[PurchaseLine],
    ) -> Result<(Vec<PurchaseRecord>, Decimal)> {
        self.in_unit(flow, |unit, flow| {
            validate::validate_lines(&*unit, buyer_id, lines)?;

            flow.enter(PurchasePhase::Locking)?;
            let plan = LockPlan::for_purchase(buyer_id, lines);
            let locked = lock::acquire(unit, &plan, flow, self.config().lock_timeout)?;

            flow.enter(PurchasePhase::Rechecking)?;
            let checked = lock::recheck(&locked, buyer_id, lines)?;

            flow.enter(PurchasePhase::Committing)?;
            let records = commit::apply(unit, locked, &checked)?;
            Ok((records, checked.total_amount))
        })
    }
}
