use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::access::{require_moderator, AccessError, CallerIdentity};
use super::clock::{Clock, SystemClock};
use super::domain::{
    ModerationDecision, Notice, NoticeId, NoticePatch, NoticeStatus, NoticeSubmission, OwnerId,
    ReferenceId,
};
use super::intake::{IntakeGuard, NoticeDraft, ValidationError};
use super::policy::PublicationPolicy;
use super::reference::{AllocationError, ReferenceAllocator};
use super::repository::{
    NoticeFilter, NoticePage, NoticeRepository, NoticeSort, Pagination, RepositoryError,
};

/// Error raised by the lifecycle and the query engine.
#[derive(Debug, thiserror::Error)]
pub enum NoticeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Authorization(#[from] AccessError),
    #[error("notice {0} not found")]
    NotFound(String),
    #[error("could not allocate a unique reference after {attempts} attempts")]
    AllocationExhausted { attempts: usize },
    #[error(transparent)]
    Storage(RepositoryError),
}

impl From<RepositoryError> for NoticeError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => Self::NotFound("record".to_string()),
            RepositoryError::Transition(err) => {
                Self::Validation(ValidationError::Transition(err.to_string()))
            }
            other => Self::Storage(other),
        }
    }
}

impl From<AllocationError> for NoticeError {
    fn from(value: AllocationError) -> Self {
        match value {
            AllocationError::Exhausted { attempts } => Self::AllocationExhausted { attempts },
            AllocationError::Repository(err) => err.into(),
        }
    }
}

/// Result of a payment confirmation. `changed` is false for repeat confirmations.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub notice: Notice,
    pub changed: bool,
}

/// Headline counts across the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NoticeStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub paid: usize,
    pub published: usize,
}

/// Service owning the notice state machine: submission, moderation, payment.
pub struct NoticeLifecycle<R> {
    repository: Arc<R>,
    allocator: ReferenceAllocator,
    clock: Arc<dyn Clock>,
    guard: IntakeGuard,
    policy: PublicationPolicy,
}

impl<R> NoticeLifecycle<R>
where
    R: NoticeRepository + 'static,
{
    pub fn new(repository: Arc<R>, policy: PublicationPolicy) -> Self {
        Self::with_parts(
            repository,
            ReferenceAllocator::random(),
            Arc::new(SystemClock),
            policy,
        )
    }

    pub fn with_parts(
        repository: Arc<R>,
        allocator: ReferenceAllocator,
        clock: Arc<dyn Clock>,
        policy: PublicationPolicy,
    ) -> Self {
        let guard = IntakeGuard::with_policy(policy.intake.clone());
        Self {
            repository,
            allocator,
            clock,
            guard,
            policy,
        }
    }

    /// Validate, stamp with a fresh reference, and store a pending notice.
    pub fn submit(
        &self,
        owner: OwnerId,
        submission: NoticeSubmission,
    ) -> Result<Notice, NoticeError> {
        let draft = self.guard.draft_from_submission(submission)?;
        let mut budget = self.allocator.attempts();

        loop {
            let reference = self
                .allocator
                .allocate_within(self.repository.as_ref(), &mut budget)?;
            let notice = self.build_notice(&owner, reference, &draft);

            match self.repository.insert(notice.clone()) {
                Ok(_) => {
                    info!(
                        reference = %notice.reference_id,
                        notice_type = %notice.notice_type(),
                        owner = %notice.owner_id,
                        "notice submitted"
                    );
                    return Ok(notice);
                }
                Err(RepositoryError::DuplicateReference(taken)) => {
                    warn!(
                        reference = %taken,
                        remaining = budget,
                        "reference claimed by a concurrent submission"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Approve or reject a notice. Approval seeds the publication date when unset.
    pub fn moderate(
        &self,
        caller: &CallerIdentity,
        id: &NoticeId,
        decision: ModerationDecision,
    ) -> Result<Notice, NoticeError> {
        require_moderator(caller)?;

        let now = self.clock.now();
        let patch = NoticePatch::moderation(decision, Some(now + self.policy.grace_period), now);
        let notice = self
            .repository
            .update(id, &patch)
            .map_err(|err| match err {
                RepositoryError::NotFound => NoticeError::NotFound(id.to_string()),
                other => other.into(),
            })?;

        info!(
            reference = %notice.reference_id,
            status = %notice.status,
            moderator = %caller.user_id,
            "notice moderated"
        );
        Ok(notice)
    }

    /// Record a confirmed payment. Never changes the moderation status.
    pub fn confirm_payment(&self, reference: &ReferenceId) -> Result<PaymentOutcome, NoticeError> {
        let before = self
            .repository
            .find_by_reference(reference)?
            .ok_or_else(|| NoticeError::NotFound(reference.to_string()))?;

        let now = self.clock.now();
        let patch = NoticePatch::payment(now + self.policy.grace_period, now);
        let notice = self
            .repository
            .update(&before.id, &patch)
            .map_err(|err| match err {
                RepositoryError::NotFound => NoticeError::NotFound(reference.to_string()),
                other => other.into(),
            })?;

        let changed = notice != before;
        if changed {
            info!(reference = %reference, publish_at = ?notice.publish_at, "payment recorded");
        } else {
            info!(reference = %reference, "payment already recorded");
        }

        Ok(PaymentOutcome { notice, changed })
    }

    /// Moderator-side confirmation for payments settled outside the webhook.
    pub fn mark_paid(
        &self,
        caller: &CallerIdentity,
        reference: &ReferenceId,
    ) -> Result<PaymentOutcome, NoticeError> {
        require_moderator(caller)?;
        let outcome = self.confirm_payment(reference)?;
        info!(
            reference = %reference,
            moderator = %caller.user_id,
            changed = outcome.changed,
            "payment marked manually"
        );
        Ok(outcome)
    }

    pub fn get_by_reference(&self, reference: &ReferenceId) -> Result<Notice, NoticeError> {
        self.repository
            .find_by_reference(reference)?
            .ok_or_else(|| NoticeError::NotFound(reference.to_string()))
    }

    pub fn get(&self, id: &NoticeId) -> Result<Notice, NoticeError> {
        self.repository
            .find_by_id(id)?
            .ok_or_else(|| NoticeError::NotFound(id.to_string()))
    }

    /// The caller's own notices, newest first.
    pub fn list_owned(
        &self,
        owner: &OwnerId,
        page: usize,
        page_size: usize,
    ) -> Result<NoticePage<Notice>, NoticeError> {
        let filter = NoticeFilter {
            owner: Some(owner.clone()),
            ..NoticeFilter::default()
        };
        self.list(&filter, page, page_size)
    }

    /// Every notice matching `filter`, newest first. Moderators only.
    pub fn list_all(
        &self,
        caller: &CallerIdentity,
        filter: NoticeFilter,
        page: usize,
        page_size: usize,
    ) -> Result<NoticePage<Notice>, NoticeError> {
        require_moderator(caller)?;
        self.list(&filter, page, page_size)
    }

    pub fn stats(&self) -> Result<NoticeStats, NoticeError> {
        let count = |filter: NoticeFilter| self.repository.count(&filter);
        let by_status = |status: NoticeStatus| NoticeFilter {
            status: Some(status),
            ..NoticeFilter::default()
        };

        Ok(NoticeStats {
            total: count(NoticeFilter::default())?,
            pending: count(by_status(NoticeStatus::Pending))?,
            approved: count(by_status(NoticeStatus::Approved))?,
            rejected: count(by_status(NoticeStatus::Rejected))?,
            paid: count(NoticeFilter {
                paid: Some(true),
                ..NoticeFilter::default()
            })?,
            published: count(NoticeFilter {
                status: Some(NoticeStatus::Approved),
                paid: Some(true),
                published_as_of: Some(self.clock.now()),
                ..NoticeFilter::default()
            })?,
        })
    }

    fn list(
        &self,
        filter: &NoticeFilter,
        page: usize,
        page_size: usize,
    ) -> Result<NoticePage<Notice>, NoticeError> {
        let window = Pagination::new(page, page_size, self.policy.max_page_size)?;
        let result = self.repository.query(
            filter,
            &NoticeSort::newest_first(),
            window.skip(),
            window.page_size,
        )?;

        Ok(NoticePage {
            data: result.items,
            page: window.page,
            limit: window.page_size,
            total: result.total,
        })
    }

    fn build_notice(&self, owner: &OwnerId, reference: ReferenceId, draft: &NoticeDraft) -> Notice {
        let now = self.clock.now();
        Notice {
            id: NoticeId::new(),
            reference_id: reference,
            owner_id: owner.clone(),
            details: draft.details.clone(),
            content: draft.content.clone(),
            status: NoticeStatus::Pending,
            paid: false,
            publish_at: None,
            price: draft.price,
            newspaper: draft.newspaper.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}
