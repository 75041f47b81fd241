//! Permission-gated values with synchronous change notification
//!
//! A [`Replicated`] value is the smallest unit of shared state. Reads are open
//! to anyone; writes go through a single permission check driven by the
//! value's declared [`WritePermission`]. A successful write that changes the
//! value invokes every observer with `(old, new)` before committing, so all
//! observers have run by the time `write` returns.

use crate::error::{GameError, Result};
use crate::ClientId;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of the process performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Caller {
    /// The single process allowed to mutate canonical state
    Authority,
    /// A connected observer, identified by its connection
    Client(ClientId),
}

impl Caller {
    pub fn is_authority(&self) -> bool {
        matches!(self, Caller::Authority)
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Caller::Authority => write!(f, "the authority"),
            Caller::Client(id) => write!(f, "client {}", id),
        }
    }
}

/// Who may write a replicated value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WritePermission {
    Authority,
    OwnerOnly,
    Anyone,
}

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

type Observer<T> = Box<dyn FnMut(&T, &T) + Send>;

/// Ensures a caller satisfies `permission` for a value owned by `owner`
///
/// This is the one place where write permissions are decided; entity methods
/// that are not backed by a single value call it directly.
pub fn check_permission(
    permission: WritePermission,
    owner: Option<ClientId>,
    caller: Caller,
    operation: &'static str,
) -> Result<()> {
    let allowed = match permission {
        WritePermission::Anyone => true,
        WritePermission::Authority => caller.is_authority(),
        WritePermission::OwnerOnly => match (caller, owner) {
            (Caller::Client(id), Some(owner)) => id == owner,
            _ => false,
        },
    };

    if allowed {
        Ok(())
    } else {
        Err(GameError::permission(operation, caller))
    }
}

pub struct Replicated<T> {
    name: &'static str,
    value: T,
    permission: WritePermission,
    owner: Option<ClientId>,
    observers: Vec<(SubscriptionId, Observer<T>)>,
    next_subscription: u64,
}

impl<T: Clone + PartialEq> Replicated<T> {
    pub fn new(name: &'static str, value: T, permission: WritePermission) -> Self {
        Self {
            name,
            value,
            permission,
            owner: None,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Binds the value to the connection allowed to write it under `OwnerOnly`
    pub fn owned_by(mut self, owner: ClientId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn read(&self) -> &T {
        &self.value
    }

    pub fn permission(&self) -> WritePermission {
        self.permission
    }

    pub fn can_write(&self, caller: Caller) -> bool {
        check_permission(self.permission, self.owner, caller, self.name).is_ok()
    }

    /// Writes a new value, notifying observers when it differs from the old one
    pub fn write(&mut self, caller: Caller, value: T) -> Result<()> {
        check_permission(self.permission, self.owner, caller, self.name)?;
        self.commit(value);
        Ok(())
    }

    fn commit(&mut self, value: T) {
        if value == self.value {
            return;
        }

        for (_, observer) in self.observers.iter_mut() {
            observer(&self.value, &value);
        }
        debug!("{} changed ({} observers)", self.name, self.observers.len());
        self.value = value;
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&T, &T) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Removes an observer; returns false if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl<T: Clone + PartialEq> Replicated<Option<T>> {
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Writes a value that may only ever be set once
    pub fn set_once(&mut self, caller: Caller, value: T) -> Result<()> {
        check_permission(self.permission, self.owner, caller, self.name)?;
        if self.value.is_some() {
            return Err(GameError::AlreadySet(self.name));
        }
        self.commit(Some(value));
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for Replicated<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replicated")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("permission", &self.permission)
            .field("owner", &self.owner)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_read_is_open_to_everyone() {
        let value = Replicated::new("health", 3, WritePermission::Authority);
        assert_eq!(*value.read(), 3);
        assert!(!value.can_write(Caller::Client(1)));
        assert!(value.can_write(Caller::Authority));
    }

    #[test]
    fn test_authority_write_notifies_with_old_and_new() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut value = Replicated::new("range", 1, WritePermission::Authority);

        let sink = Arc::clone(&seen);
        value.subscribe(move |old, new| sink.lock().unwrap().push((*old, *new)));

        value.write(Caller::Authority, 2).unwrap();
        value.write(Caller::Authority, 5).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (2, 5)]);
        assert_eq!(*value.read(), 5);
    }

    #[test]
    fn test_client_write_to_authority_value_fails() {
        let mut value = Replicated::new("health", 3, WritePermission::Authority);
        let err = value.write(Caller::Client(7), 0).unwrap_err();

        assert!(matches!(err, GameError::Permission { caller: Caller::Client(7), .. }));
        assert_eq!(*value.read(), 3);
    }

    #[test]
    fn test_owner_only_rejects_other_clients_and_authority() {
        let mut name = Replicated::new("screen name", String::new(), WritePermission::OwnerOnly)
            .owned_by(2);

        assert!(name.write(Caller::Client(3), "mallory".into()).is_err());
        assert!(name.write(Caller::Authority, "server".into()).is_err());
        name.write(Caller::Client(2), "alice".into()).unwrap();
        assert_eq!(name.read(), "alice");
    }

    #[test]
    fn test_anyone_can_write() {
        let mut value = Replicated::new("note", 0u8, WritePermission::Anyone);
        value.write(Caller::Client(9), 4).unwrap();
        assert_eq!(*value.read(), 4);
    }

    #[test]
    fn test_unchanged_write_is_silent() {
        let count = Arc::new(Mutex::new(0));
        let mut value = Replicated::new("active", false, WritePermission::Authority);

        let sink = Arc::clone(&count);
        value.subscribe(move |_, _| *sink.lock().unwrap() += 1);
        value.write(Caller::Authority, false).unwrap();

        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let mut value = Replicated::new("active", false, WritePermission::Authority);

        let sink = Arc::clone(&count);
        let id = value.subscribe(move |_, _| *sink.lock().unwrap() += 1);
        assert!(value.unsubscribe(id));
        assert!(!value.unsubscribe(id));

        value.write(Caller::Authority, true).unwrap();
        assert_eq!(*count.lock().unwrap(), 0);
        assert_eq!(value.observer_count(), 0);
    }

    #[test]
    fn test_set_once() {
        let mut owner: Replicated<Option<u32>> =
            Replicated::new("tank owner", None, WritePermission::Authority);

        assert!(matches!(
            owner.set_once(Caller::Client(1), 1),
            Err(GameError::Permission { .. })
        ));
        owner.set_once(Caller::Authority, 1).unwrap();
        assert_eq!(
            owner.set_once(Caller::Authority, 2),
            Err(GameError::AlreadySet("tank owner"))
        );
        assert_eq!(*owner.read(), Some(1));
    }
}
