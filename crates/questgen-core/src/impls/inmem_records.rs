//! InMemoryRecordStore - 開発用の record store
//!
//! Holds users, preferences and generated questions in process memory. The CLI
//! demo and the tests seed it directly.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{
    GeneratedQuestion, GeneratedQuestions, PreferenceId, PreferenceRecord, PreferenceStatus,
    QuestionId, UserId, UserRecord,
};
use crate::ports::{Clock, RecordStore, RecordStoreError, SystemClock};

/// A question row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredQuestion {
    pub id: QuestionId,
    pub preference_id: PreferenceId,
    pub question: GeneratedQuestion,
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, UserRecord>,
    preferences: HashMap<PreferenceId, PreferenceRecord>,
    questions: BTreeMap<QuestionId, StoredQuestion>,
    next_user_id: i64,
    next_preference_id: i64,
    next_question_id: i64,
}

pub struct InMemoryRecordStore {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables {
                next_user_id: 1,
                next_preference_id: 1,
                next_question_id: 1,
                ..Tables::default()
            }),
            clock,
            unavailable: AtomicBool::new(false),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> Result<(), RecordStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(RecordStoreError::Unavailable(
                "in-memory store switched off".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert a user; the `id` field is replaced by a fresh one.
    pub fn add_user(&self, mut user: UserRecord) -> UserId {
        let mut t = self.tables();
        let id = UserId(t.next_user_id);
        t.next_user_id += 1;
        user.id = id;
        t.users.insert(id, user);
        id
    }

    /// Open a new `pending` preference session for a user.
    pub fn add_preference(&self, user_id: UserId) -> PreferenceId {
        let now = self.clock.now();
        let mut t = self.tables();
        let id = PreferenceId(t.next_preference_id);
        t.next_preference_id += 1;
        t.preferences.insert(
            id,
            PreferenceRecord {
                id,
                user_id,
                status: PreferenceStatus::Pending,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn remove_preference(&self, id: PreferenceId) -> Option<PreferenceRecord> {
        self.tables().preferences.remove(&id)
    }

    pub fn preference_status(&self, id: PreferenceId) -> Option<PreferenceStatus> {
        self.tables().preferences.get(&id).map(|p| p.status)
    }

    pub fn questions_for(&self, preference_id: PreferenceId) -> Vec<StoredQuestion> {
        self.tables()
            .questions
            .values()
            .filter(|q| q.preference_id == preference_id)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn read_preference(&self, id: PreferenceId) -> Result<PreferenceRecord, RecordStoreError> {
        self.check_available()?;
        self.tables()
            .preferences
            .get(&id)
            .cloned()
            .ok_or_else(|| RecordStoreError::preference_not_found(id))
    }

    async fn read_user(&self, id: UserId) -> Result<UserRecord, RecordStoreError> {
        self.check_available()?;
        self.tables()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| RecordStoreError::user_not_found(id))
    }

    async fn set_preference_status(
        &self,
        id: PreferenceId,
        status: PreferenceStatus,
    ) -> Result<(), RecordStoreError> {
        self.check_available()?;
        let now = self.clock.now();
        let mut t = self.tables();
        let pref = t
            .preferences
            .get_mut(&id)
            .ok_or_else(|| RecordStoreError::preference_not_found(id))?;
        pref.status = status;
        pref.updated_at = now;
        Ok(())
    }

    async fn save_questions(
        &self,
        preference_id: PreferenceId,
        questions: &GeneratedQuestions,
    ) -> Result<Vec<QuestionId>, RecordStoreError> {
        self.check_available()?;
        let mut t = self.tables();
        if !t.preferences.contains_key(&preference_id) {
            return Err(RecordStoreError::preference_not_found(preference_id));
        }
        let mut ids = Vec::with_capacity(questions.len());
        for question in &questions.questions {
            let id = QuestionId(t.next_question_id);
            t.next_question_id += 1;
            t.questions.insert(
                id,
                StoredQuestion {
                    id,
                    preference_id,
                    question: question.clone(),
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserRecord {
        UserRecord {
            id: UserId(0),
            name: "Bruno".into(),
            age: 41,
            gender: "male".into(),
            location: "Porto".into(),
            driving_style: Some("sporty".into()),
            fuel_preference: None,
            budget_sensitivity: None,
            risk_tolerance: None,
        }
    }

    #[tokio::test]
    async fn preferences_start_pending_and_track_status() {
        let store = InMemoryRecordStore::new();
        let uid = store.add_user(user());
        let pid = store.add_preference(uid);

        let pref = store.read_preference(pid).await.unwrap();
        assert_eq!(pref.user_id, uid);
        assert_eq!(pref.status, PreferenceStatus::Pending);

        store
            .set_preference_status(pid, PreferenceStatus::Generating)
            .await
            .unwrap();
        assert_eq!(
            store.preference_status(pid),
            Some(PreferenceStatus::Generating)
        );
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let store = InMemoryRecordStore::new();
        let err = store.read_preference(PreferenceId(42)).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "preference 42 not found");
        assert!(store.read_user(UserId(1)).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn save_questions_assigns_sequential_ids() {
        let store = InMemoryRecordStore::new();
        let pid = store.add_preference(store.add_user(user()));
        let generated = GeneratedQuestions::new(vec![
            GeneratedQuestion::new("experience", "A to B, or part of the trip?"),
            GeneratedQuestion::new("technology", "Screens or simple?"),
        ]);

        let ids = store.save_questions(pid, &generated).await.unwrap();
        assert_eq!(ids, vec![QuestionId(1), QuestionId(2)]);
        assert_eq!(store.questions_for(pid).len(), 2);

        let more = store.save_questions(pid, &generated).await.unwrap();
        assert_eq!(more, vec![QuestionId(3), QuestionId(4)]);
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let store = InMemoryRecordStore::new();
        let pid = store.add_preference(store.add_user(user()));
        store.set_unavailable(true);
        let err = store.read_preference(pid).await.unwrap_err();
        assert!(matches!(err, RecordStoreError::Unavailable(_)));
        store.set_unavailable(false);
        assert!(store.read_preference(pid).await.is_ok());
    }
}
