use std::{
    collections::{BTreeSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::{trace, warn};

use crate::error::LaunchError;

/// Relay ports exposed by the pod: two for the source and two for the destination.
pub const RELAY_PORTS: [u16; 4] = [9877, 9878, 9879, 9880];

/// A replication needs both ends wired at once.
pub const MIN_RELAY_PORTS: usize = 4;

/// Fixed block of relay ports shared with the cluster launcher.
///
/// Built exactly once by the bootstrap and passed by `Arc`; there is no global
/// instance to re-initialize.
#[derive(Debug)]
pub struct PortPool {
    declared: BTreeSet<u16>,
    free: Mutex<VecDeque<u16>>,
}

impl PortPool {
    /// Reserve `ports`. Duplicates are collapsed; fewer than [`MIN_RELAY_PORTS`] distinct
    /// ports is rejected.
    pub fn new<I>(ports: I) -> Result<Self, LaunchError>
    where
        I: IntoIterator<Item = u16>,
    {
        let mut declared = BTreeSet::new();
        let mut free = VecDeque::new();
        for port in ports {
            if port == 0 {
                return Err(LaunchError::InvalidPortPool("port 0 is not reservable".into()));
            }
            if declared.insert(port) {
                free.push_back(port);
            }
        }
        if declared.len() < MIN_RELAY_PORTS {
            return Err(LaunchError::InvalidPortPool(format!(
                "need at least {MIN_RELAY_PORTS} ports, got {}",
                declared.len()
            )));
        }
        Ok(Self {
            declared,
            free: Mutex::new(free),
        })
    }

    pub fn capacity(&self) -> usize {
        self.declared.len()
    }

    pub fn available(&self) -> usize {
        self.lock().len()
    }

    /// Return a port. Ports outside the block, or already free, are ignored.
    pub fn offer(&self, port: u16) {
        if !self.declared.contains(&port) {
            warn!(target: "podlaunch.exec.ports", port, "offered port is not part of the pool");
            return;
        }
        let mut free = self.lock();
        if !free.contains(&port) {
            free.push_back(port);
            trace!(target: "podlaunch.exec.ports", port, "offer");
        }
    }

    /// Take `n` ports at once; all or nothing.
    pub fn lease(self: &Arc<Self>, n: usize) -> Result<PortLease, LaunchError> {
        let mut free = self.lock();
        if free.len() < n {
            return Err(LaunchError::PortsExhausted {
                needed: n,
                available: free.len(),
            });
        }
        let ports = free.drain(..n).collect();
        Ok(PortLease {
            pool: Arc::clone(self),
            ports,
        })
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<u16>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ports held by one workload; returned to the pool on drop.
#[derive(Debug)]
pub struct PortLease {
    pool: Arc<PortPool>,
    ports: Vec<u16>,
}

impl PortLease {
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        for port in self.ports.drain(..) {
            self.pool.offer(port);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_blocks() {
        assert!(matches!(
            PortPool::new([9877, 9878, 9879]),
            Err(LaunchError::InvalidPortPool(_))
        ));
        assert!(matches!(
            PortPool::new([9877, 9877, 9878, 9879]),
            Err(LaunchError::InvalidPortPool(_))
        ));
        assert!(PortPool::new([0, 1, 2, 3]).is_err());
    }

    #[test]
    fn offer_ignores_foreign_and_duplicate_ports() {
        let pool = Arc::new(PortPool::new(RELAY_PORTS).unwrap());
        assert_eq!(pool.capacity(), 4);

        let lease = pool.lease(1).unwrap();
        let p = lease.ports()[0];
        assert_eq!(p, 9877);
        assert_eq!(pool.available(), 3);

        pool.offer(p);
        pool.offer(p);
        pool.offer(1234);
        assert_eq!(pool.available(), 4);

        drop(lease);
        assert_eq!(pool.available(), 4);
    }

    #[test]
    fn lease_is_all_or_nothing_and_returns_on_drop() {
        let pool = Arc::new(PortPool::new(RELAY_PORTS).unwrap());

        let first = pool.lease(3).unwrap();
        assert_eq!(first.ports(), &[9877, 9878, 9879]);
        assert!(matches!(
            pool.lease(2),
            Err(LaunchError::PortsExhausted { needed: 2, available: 1 })
        ));
        assert_eq!(pool.available(), 1);

        drop(first);
        assert_eq!(pool.available(), 4);
    }
}
