/*
 * Memoized container-supplied ambient properties.
 *
 * A lookup first consults the cache; on a miss it pulls the value from the
 * client site and remembers both outcomes: a value, or the fact that the
 * host supplies none (the empty flag). Change notifications invalidate,
 * they never eagerly refresh; the next lookup refetches.
 */

use crate::types::{DispId, Variant};

#[derive(Debug, Clone)]
pub struct AmbientProperty {
    name: &'static str,
    dispid: DispId,
    value: Option<Variant>,
    /// Set when the host was asked and answered "no such ambient".
    empty: bool,
}

impl AmbientProperty {
    fn new(name: &'static str, dispid: DispId) -> Self {
        Self {
            name,
            dispid,
            value: None,
            empty: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn dispid(&self) -> DispId {
        self.dispid
    }

    fn reset(&mut self) {
        self.value = None;
        self.empty = false;
    }
}

#[derive(Debug, Default)]
pub struct AmbientCache {
    properties: Vec<AmbientProperty>,
}

impl AmbientCache {
    /// The standard ambient set both engines care about.
    pub fn standard() -> Self {
        Self {
            properties: vec![
                AmbientProperty::new("Font", DispId::AMBIENT_FONT),
                AmbientProperty::new("BackColor", DispId::AMBIENT_BACKCOLOR),
                AmbientProperty::new("ForeColor", DispId::AMBIENT_FORECOLOR),
                AmbientProperty::new("UserMode", DispId::AMBIENT_USERMODE),
                AmbientProperty::new("UIDead", DispId::AMBIENT_UIDEAD),
            ],
        }
    }

    /*
     * Split lookup: `cached` answers warm entries without touching the
     * host, `store` memoizes a fetched answer. Callers keeping the cache
     * behind a `RefCell` fetch from the host between the two calls, never
     * while the cache is borrowed (the host may notify back into us).
     */
    pub fn cached(&self, dispid: DispId) -> Option<Option<Variant>> {
        let entry = self.properties.iter().find(|p| p.dispid == dispid)?;
        if entry.empty {
            return Some(None);
        }
        entry.value.clone().map(Some)
    }

    /// Memoizes a host answer, including "the host supplies none".
    pub fn store(&mut self, dispid: DispId, value: Option<Variant>) {
        let Some(entry) = self.properties.iter_mut().find(|p| p.dispid == dispid) else {
            return;
        };
        match value {
            Some(value) => {
                log::debug!("AmbientCache: filled '{}' from host", entry.name);
                entry.value = Some(value);
                entry.empty = false;
            }
            None => {
                entry.value = None;
                entry.empty = true;
            }
        }
    }

    /// Cached value for `dispid`, fetching through `fetch` on a cold entry.
    /// Unknown dispids pass straight through to `fetch`, uncached.
    pub fn get(
        &mut self,
        dispid: DispId,
        fetch: impl FnOnce(DispId) -> Option<Variant>,
    ) -> Option<Variant> {
        if self.properties.iter().all(|p| p.dispid != dispid) {
            return fetch(dispid);
        }
        if let Some(hit) = self.cached(dispid) {
            return hit;
        }
        let value = fetch(dispid);
        self.store(dispid, value.clone());
        value
    }

    /// Drop the cached value for `dispid`; `DispId::UNKNOWN` drops them all.
    pub fn invalidate(&mut self, dispid: DispId) {
        if dispid == DispId::UNKNOWN {
            log::debug!("AmbientCache: invalidating all ambient properties");
            for entry in &mut self.properties {
                entry.reset();
            }
            return;
        }
        if let Some(entry) = self.properties.iter_mut().find(|p| p.dispid == dispid) {
            log::debug!("AmbientCache: invalidating '{}'", entry.name);
            entry.reset();
        }
    }
}
