//! Keyed reconciliation of externally owned resources
//!
//! Both adapters own things the game state only describes: physics bodies
//! and screen primitives. Each frame they hand the current snapshot to a
//! `Reconciler`, which attaches a resource for every new key, refreshes every
//! key still present, and detaches every key that disappeared.
//!
//! Guarantees per pass:
//! - `attach` runs at most once per key while it stays tracked
//! - `refresh` runs once for every present key that has a resource,
//!   including keys attached in the same pass
//! - a detached resource is never refreshed again

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::EntityKey;

/// An item with a stable identity and a discriminant tag
pub trait Keyed {
    type Kind: Copy + Eq + Debug;

    fn key(&self) -> EntityKey;
    fn kind(&self) -> Self::Kind;
}

/// A family of snapshot items, usually borrowing from the state they describe
pub trait Dataset {
    type Kind: Copy + Eq + Debug;
    type Item<'a>: Keyed<Kind = Self::Kind>;
}

/// Type-specific handler creating, updating and releasing one kind of resource
///
/// `H` is the external host owning the resources (a physics world, a drawing
/// surface); it is lent to every callback.
pub trait Driver<D: Dataset, R, H: ?Sized> {
    /// Whether this driver handles items with the given tag
    fn matches(&self, kind: D::Kind) -> bool;

    /// Create the resource for a new item; `None` leaves the item unbound
    fn attach(&mut self, item: &D::Item<'_>, host: &mut H) -> Option<R>;

    fn refresh(&mut self, item: &mut D::Item<'_>, resource: &mut R, host: &mut H);

    fn detach(&mut self, resource: R, host: &mut H);
}

struct Binding<R> {
    driver: usize,
    resource: R,
    /// Last pass this key was present in
    pass: u64,
}

/// Tracks key → resource bindings across passes
pub struct Reconciler<D: Dataset, R, H: ?Sized> {
    drivers: Vec<Box<dyn Driver<D, R, H>>>,
    bound: BTreeMap<EntityKey, Binding<R>>,
    pass: u64,
}

impl<D: Dataset, R, H: ?Sized> Default for Reconciler<D, R, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dataset, R, H: ?Sized> Reconciler<D, R, H> {
    pub fn new() -> Self {
        Self {
            drivers: Vec::new(),
            bound: BTreeMap::new(),
            pass: 0,
        }
    }

    /// Register a driver; earlier drivers win when several match
    pub fn with_driver(mut self, driver: impl Driver<D, R, H> + 'static) -> Self {
        self.drivers.push(Box::new(driver));
        self
    }

    /// Bring tracked resources in line with `items`
    pub fn reconcile<'a, I>(&mut self, items: I, host: &mut H)
    where
        I: IntoIterator<Item = D::Item<'a>>,
    {
        self.pass += 1;
        let pass = self.pass;

        for mut item in items {
            let key = item.key();
            if let Some(binding) = self.bound.get_mut(&key) {
                if binding.pass == pass {
                    log::warn!("Duplicate key {} in one reconcile pass", key);
                    continue;
                }
                binding.pass = pass;
                self.drivers[binding.driver].refresh(&mut item, &mut binding.resource, host);
                continue;
            }

            let kind = item.kind();
            let Some(index) = self.drivers.iter().position(|d| d.matches(kind)) else {
                log::trace!("No driver for {:?} {}", kind, key);
                continue;
            };
            let driver = &mut self.drivers[index];
            let Some(mut resource) = driver.attach(&item, host) else {
                log::trace!("Driver declined {:?} {}", kind, key);
                continue;
            };
            driver.refresh(&mut item, &mut resource, host);
            self.bound.insert(
                key,
                Binding {
                    driver: index,
                    resource,
                    pass,
                },
            );
        }

        let stale: Vec<EntityKey> = self
            .bound
            .iter()
            .filter(|(_, b)| b.pass != pass)
            .map(|(k, _)| *k)
            .collect();
        for key in stale {
            if let Some(binding) = self.bound.remove(&key) {
                self.drivers[binding.driver].detach(binding.resource, host);
            }
        }
    }

    /// Detach every tracked resource
    pub fn clear(&mut self, host: &mut H) {
        for (_, binding) in std::mem::take(&mut self.bound) {
            self.drivers[binding.driver].detach(binding.resource, host);
        }
    }

    pub fn resource(&self, key: EntityKey) -> Option<&R> {
        self.bound.get(&key).map(|b| &b.resource)
    }

    pub fn is_tracked(&self, key: EntityKey) -> bool {
        self.bound.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}
