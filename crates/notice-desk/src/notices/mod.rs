//! Notice lifecycle and publication queries.
//!
//! A notice is submitted by its owner, stamped with a unique `REF-` reference,
//! moderated, paid for, and finally listed publicly once its publication date
//! arrives. Storage sits behind [`NoticeRepository`]; the HTTP surface lives in
//! [`router`].

pub mod access;
pub mod clock;
pub mod domain;
pub mod import;
pub mod intake;
pub mod lifecycle;
pub mod memory;
pub mod policy;
pub mod query;
pub mod reference;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use access::{AccessError, CallerIdentity, Role};
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    ModerationDecision, Notice, NoticeDetails, NoticeId, NoticeStatus, NoticeSubmission,
    NoticeType, OwnerId, PaymentConfirmed, PublicNoticeView, ReferenceId,
};
pub use import::{ImportSummary, NoticeImportError, NoticeImporter};
pub use intake::{IntakeGuard, IntakePolicy, ValidationError};
pub use lifecycle::{NoticeError, NoticeLifecycle, NoticeStats, PaymentOutcome};
pub use memory::InMemoryNoticeRepository;
pub use policy::PublicationPolicy;
pub use query::{Audience, PublicScope, PublicationQueryEngine, QueryRequest};
pub use reference::{
    RandomReferenceGenerator, ReferenceAllocator, ReferenceGenerator, ScriptedReferenceGenerator,
};
pub use repository::{
    NoticeFilter, NoticePage, NoticeRepository, NoticeSort, RepositoryError, SortDirection,
    SortField,
};
pub use router::{notice_router, NoticeApi};
