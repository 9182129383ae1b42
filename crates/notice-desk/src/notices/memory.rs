use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{Notice, NoticeId, NoticePatch, ReferenceId};
use super::repository::{NoticeFilter, NoticeRepository, NoticeSort, QueryResult, RepositoryError};

#[derive(Debug, Default)]
struct Store {
    records: HashMap<NoticeId, Notice>,
    by_reference: HashMap<ReferenceId, NoticeId>,
}

/// Process-local repository. One mutex covers both the records and the
/// reference index, so inserts and patches are atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryNoticeRepository {
    store: Arc<Mutex<Store>>,
}

impl InMemoryNoticeRepository {
    fn lock(&self) -> Result<MutexGuard<'_, Store>, RepositoryError> {
        self.store
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|store| store.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NoticeRepository for InMemoryNoticeRepository {
    fn exists(&self, reference: &ReferenceId) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.by_reference.contains_key(reference))
    }

    fn insert(&self, notice: Notice) -> Result<NoticeId, RepositoryError> {
        let mut store = self.lock()?;
        if store.by_reference.contains_key(&notice.reference_id) {
            return Err(RepositoryError::DuplicateReference(notice.reference_id));
        }
        if store.records.contains_key(&notice.id) {
            return Err(RepositoryError::DuplicateId(notice.id));
        }

        let id = notice.id;
        store.by_reference.insert(notice.reference_id.clone(), id);
        store.records.insert(id, notice);
        Ok(id)
    }

    fn find_by_id(&self, id: &NoticeId) -> Result<Option<Notice>, RepositoryError> {
        Ok(self.lock()?.records.get(id).cloned())
    }

    fn find_by_reference(
        &self,
        reference: &ReferenceId,
    ) -> Result<Option<Notice>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .by_reference
            .get(reference)
            .and_then(|id| store.records.get(id))
            .cloned())
    }

    fn update(&self, id: &NoticeId, patch: &NoticePatch) -> Result<Notice, RepositoryError> {
        let mut store = self.lock()?;
        let record = store.records.get_mut(id).ok_or(RepositoryError::NotFound)?;

        // Patch a copy so a rejected transition leaves the stored record untouched.
        let mut next = record.clone();
        next.apply(patch)?;
        *record = next.clone();
        Ok(next)
    }

    fn query(
        &self,
        filter: &NoticeFilter,
        sort: &NoticeSort,
        skip: usize,
        limit: usize,
    ) -> Result<QueryResult, RepositoryError> {
        let store = self.lock()?;
        let mut matching: Vec<&Notice> = store
            .records
            .values()
            .filter(|notice| filter.matches(notice))
            .collect();
        let total = matching.len();

        matching.sort_by(|left, right| sort.compare(left, right));
        let items = matching
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect();

        Ok(QueryResult { items, total })
    }

    fn count(&self, filter: &NoticeFilter) -> Result<usize, RepositoryError> {
        Ok(self
            .lock()?
            .records
            .values()
            .filter(|notice| filter.matches(notice))
            .count())
    }
}
