use super::{Param, ParamId, ParamType, ParamValue};
use crate::bundler::error::{Error, Result};
use std::collections::BTreeMap;

/// Mutable parameter map shared by one artifact build.
///
/// Serves as both input and memo cache. A store is owned by a single build and
/// accessed from one task at a time; batches clone the seed store per build.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamStore {
    values: BTreeMap<ParamId, ParamValue>,
    resolving: Vec<ParamId>,
}

impl ParamStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a typed value, replacing any previous entry.
    pub fn put(&mut self, id: ParamId, value: impl Into<ParamValue>) {
        self.values.insert(id, value.into());
    }

    /// Stores an unconverted string, replacing any previous entry.
    pub fn put_raw(&mut self, id: ParamId, raw: impl Into<String>) {
        self.values.insert(id, ParamValue::Raw(raw.into()));
    }

    /// Marks an entry as explicitly absent; later fetches return `None`
    /// without consulting the default.
    pub fn clear(&mut self, id: ParamId) {
        self.values.insert(id, ParamValue::Unset);
    }

    /// Drops an entry entirely, so the next fetch recomputes it.
    pub fn remove(&mut self, id: ParamId) -> Option<ParamValue> {
        self.values.remove(&id)
    }

    /// Whether any entry, raw, typed or cleared, exists for `id`.
    pub fn contains(&self, id: ParamId) -> bool {
        self.values.contains_key(&id)
    }

    /// Whether a usable (non-cleared) entry exists for `id`.
    pub fn is_set(&self, id: ParamId) -> bool {
        !matches!(self.values.get(&id), None | Some(ParamValue::Unset))
    }

    /// Copies every entry of `other` over this store.
    pub fn overlay(&mut self, other: &ParamStore) {
        for (id, value) in &other.values {
            self.values.insert(*id, value.clone());
        }
    }

    /// Raw access to a stored entry.
    pub fn get(&self, id: ParamId) -> Option<&ParamValue> {
        self.values.get(&id)
    }

    /// Typed read of an already resolved entry. Never computes or converts.
    pub fn peek<T: ParamType>(&self, param: &Param<T>) -> Option<T> {
        self.values.get(&param.id()).and_then(T::from_value)
    }

    /// Ids currently present, in key order.
    pub fn ids(&self) -> impl Iterator<Item = ParamId> + '_ {
        self.values.keys().copied()
    }

    /// Resolves a parameter, converting or computing and caching as needed.
    pub fn fetch<T: ParamType>(&mut self, param: &Param<T>) -> Result<Option<T>> {
        let id = param.id();

        match self.values.get(&id) {
            Some(ParamValue::Unset) => return Ok(None),
            Some(ParamValue::Raw(raw)) => {
                let raw = raw.clone();
                let Some(convert) = param.convert_fn() else {
                    return Err(Error::ParamConversion {
                        id,
                        value: raw,
                        reason: "parameter does not accept string values".into(),
                    });
                };
                let value = self.guarded(id, |store| convert(&raw, store))?;
                self.values.insert(id, value.clone().into_value());
                return Ok(Some(value));
            }
            Some(stored) => {
                return T::from_value(stored).map(Some).ok_or_else(|| Error::ParamConversion {
                    id,
                    value: format!("{stored:?}"),
                    reason: "stored value has a different type".into(),
                });
            }
            None => {}
        }

        let Some(default) = param.default_fn() else {
            return Ok(None);
        };
        let computed = self.guarded(id, default)?;
        if let Some(value) = &computed {
            self.values.insert(id, value.clone().into_value());
        }
        Ok(computed)
    }

    /// Resolves a parameter that must be present.
    pub fn require<T: ParamType>(&mut self, param: &Param<T>) -> Result<T> {
        self.fetch(param)?.ok_or_else(|| {
            Error::config(
                format!("missing required parameter '{}'", param.id()),
                format!("Pass --{} or set it in the parameter file", param.id()),
            )
        })
    }

    /// Resolves a parameter, substituting `fallback` when absent.
    pub fn fetch_or<T: ParamType>(&mut self, param: &Param<T>, fallback: T) -> Result<T> {
        Ok(self.fetch(param)?.unwrap_or(fallback))
    }

    fn guarded<R>(
        &mut self,
        id: ParamId,
        compute: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        if self.resolving.contains(&id) {
            let mut chain = self.resolving.clone();
            chain.push(id);
            return Err(Error::ParamCycle { chain });
        }
        self.resolving.push(id);
        let result = compute(self);
        self.resolving.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static CALLS: Cell<u32> = const { Cell::new(0) };
    }

    fn counted_default(_: &mut ParamStore) -> Result<Option<String>> {
        CALLS.with(|c| c.set(c.get() + 1));
        Ok(Some("computed".into()))
    }

    fn upper(raw: &str, _: &mut ParamStore) -> Result<String> {
        Ok(raw.to_uppercase())
    }

    const COUNTED: Param<String> = Param::new(ParamId::Title)
        .with_default(counted_default)
        .with_convert(upper);

    fn self_referencing(store: &mut ParamStore) -> Result<Option<String>> {
        store.fetch(&SELF_REF)
    }

    const SELF_REF: Param<String> = Param::new(ParamId::Description).with_default(self_referencing);

    #[test]
    fn test_default_computed_once() {
        CALLS.with(|c| c.set(0));
        let mut store = ParamStore::new();
        assert_eq!(store.fetch(&COUNTED).unwrap().as_deref(), Some("computed"));
        assert_eq!(store.fetch(&COUNTED).unwrap().as_deref(), Some("computed"));
        assert_eq!(CALLS.with(Cell::get), 1);
    }

    #[test]
    fn test_raw_value_converted_and_cached() {
        let mut store = ParamStore::new();
        store.put_raw(ParamId::Title, "hello");
        assert_eq!(store.fetch(&COUNTED).unwrap().as_deref(), Some("HELLO"));
        assert_eq!(store.get(ParamId::Title), Some(&ParamValue::Str("HELLO".into())));
    }

    #[test]
    fn test_typed_value_returned_unchanged() {
        let mut store = ParamStore::new();
        store.put(ParamId::Title, "lower");
        assert_eq!(store.fetch(&COUNTED).unwrap().as_deref(), Some("lower"));
    }

    #[test]
    fn test_cleared_entry_skips_default() {
        CALLS.with(|c| c.set(0));
        let mut store = ParamStore::new();
        store.clear(ParamId::Title);
        assert_eq!(store.fetch(&COUNTED).unwrap(), None);
        assert_eq!(CALLS.with(Cell::get), 0);
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let mut store = ParamStore::new();
        store.put(ParamId::Title, true);
        let err = store.fetch(&COUNTED).unwrap_err();
        assert!(matches!(err, Error::ParamConversion { id: ParamId::Title, .. }));
    }

    #[test]
    fn test_cycle_detected() {
        let mut store = ParamStore::new();
        let err = store.fetch(&SELF_REF).unwrap_err();
        match err {
            Error::ParamCycle { chain } => {
                assert_eq!(chain, vec![ParamId::Description, ParamId::Description]);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Guard state is unwound after the failure.
        store.put(ParamId::Description, "set");
        assert_eq!(store.fetch(&SELF_REF).unwrap().as_deref(), Some("set"));
    }
}
