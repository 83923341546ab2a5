use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{pipeline::SinkLauncher, settings::SessionConfig, utils::Clock};

use super::controller::Session;

const ENABLE_LOGS: bool = true;

use crate::log_info;

pub enum Registration {
    /// First contact from this address; the caller owns the session's lifecycle.
    Created(Arc<Session>),
    /// The address already has a live session.
    Existing(Arc<Session>),
}

/// Client address -> live session.
///
/// The map lock is only held for lookup, insert and delete, never across an
/// await and never while a session lock is held.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    next_session_no: Mutex<u32>,
    config: SessionConfig,
    launcher: Arc<dyn SinkLauncher>,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    pub fn new(
        config: SessionConfig,
        launcher: Arc<dyn SinkLauncher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_session_no: Mutex::new(0),
            config,
            launcher,
            clock,
        }
    }

    pub fn get_or_create(&self, client_id: &str) -> Registration {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = sessions.get(client_id) {
            return Registration::Existing(Arc::clone(existing));
        }

        let session_no = {
            let mut next = self
                .next_session_no
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *next = next.wrapping_add(1);
            *next
        };
        let session = Arc::new(Session::new(
            client_id,
            session_no,
            self.config.clone(),
            Arc::clone(&self.launcher),
            Arc::clone(&self.clock),
        ));
        sessions.insert(client_id.to_string(), Arc::clone(&session));
        log_info!("[{}] session {} registered", client_id, session_no);

        Registration::Created(session)
    }

    pub fn remove(&self, client_id: &str) -> Option<Arc<Session>> {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(client_id);
        if removed.is_some() {
            log_info!("[{}] session removed", client_id);
        }
        removed
    }

    pub fn get(&self, client_id: &str) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(client_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes every session, e.g. on server shutdown. Each entry stays
    /// registered until its ticker and encoder are gone.
    pub async fn shutdown_all(&self) {
        let live: Vec<(String, Arc<Session>)> = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(client_id, session)| (client_id.clone(), Arc::clone(session)))
            .collect();

        for (client_id, session) in live {
            session.close().await;

            let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            // The connection task may already have removed it and a new
            // stream from the same address registered a fresh session.
            if sessions
                .get(&client_id)
                .is_some_and(|current| Arc::ptr_eq(current, &session))
            {
                sessions.remove(&client_id);
                log_info!("[{}] session removed on shutdown", client_id);
            }
        }
    }
}
