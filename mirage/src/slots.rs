use std::sync::Arc;

use ahash::AHashMap;
use bitflags::bitflags;

use crate::{Method, ObjectId, RuntimeError, RuntimeResult, Symbol, Value};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SlotFlags: u8 {
        /// field has a mutator (`x:=`)
        const MUTABLE = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldInfo {
    pub name: Symbol,
    pub flags: SlotFlags,
}

/// Field layout: selector -> index into an object's value vector.
///
/// Published maps are shared between an object and its clones behind an
/// `Arc`; a holder that changes its layout gets a private copy first.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    fields: Vec<FieldInfo>,
    indices: AHashMap<Symbol, usize>,
}

impl FieldMap {
    pub fn get(&self, selector: Symbol) -> Option<usize> {
        self.indices.get(&selector).copied()
    }

    pub fn info(&self, index: usize) -> FieldInfo {
        self.fields[index]
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.iter()
    }

    pub fn put(
        &mut self,
        selector: Symbol,
        flags: SlotFlags,
    ) -> RuntimeResult<usize> {
        if self.indices.contains_key(&selector) {
            return Err(RuntimeError::DuplicateSlot { selector });
        }
        let index = self.fields.len();
        self.fields.push(FieldInfo {
            name: selector,
            flags,
        });
        self.indices.insert(selector, index);
        Ok(index)
    }

    fn without(&self, removed: usize) -> FieldMap {
        let mut map = FieldMap::default();
        for (i, info) in self.fields.iter().enumerate() {
            if i != removed {
                // names are unique in the source map
                let _ = map.put(info.name, info.flags);
            }
        }
        map
    }
}

/// Methods are kept in definition order for listing.
#[derive(Debug, Clone, Default)]
pub struct MethodDictionary {
    methods: Vec<Arc<Method>>,
    indices: AHashMap<Symbol, usize>,
}

impl MethodDictionary {
    pub fn get(&self, selector: Symbol) -> Option<&Arc<Method>> {
        self.indices.get(&selector).map(|&i| &self.methods[i])
    }

    pub fn contains(&self, selector: Symbol) -> bool {
        self.indices.contains_key(&selector)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Method>> {
        self.methods.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    fn insert(&mut self, method: Arc<Method>) {
        self.indices.insert(method.name, self.methods.len());
        self.methods.push(method);
    }

    fn remove(&mut self, selector: Symbol) -> Option<Arc<Method>> {
        let index = self.indices.remove(&selector)?;
        let method = self.methods.remove(index);
        for slot in self.indices.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        Some(method)
    }
}

/// A programmer-supplied field object installed after the native layout.
/// `field` answers `name`, `readField`, `writeField` and `new`.
#[derive(Debug, Clone)]
pub struct CustomField {
    pub name: Symbol,
    pub field: Value,
}

/// First-class reference to a native field, handed out by `grabField`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeField {
    pub host: ObjectId,
    pub name: Symbol,
}

#[derive(Debug, Clone, Default)]
pub struct SlotStorage {
    map: Arc<FieldMap>,
    values: Vec<Value>,
    methods: MethodDictionary,
    custom: Vec<CustomField>,
}

impl SlotStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A selector lives in at most one of: field map, method dictionary,
    /// custom field list.
    pub fn has_slot(&self, selector: Symbol) -> bool {
        self.map.get(selector).is_some()
            || self.methods.contains(selector)
            || self.custom_index(selector).is_some()
    }

    pub fn field_map(&self) -> &Arc<FieldMap> {
        &self.map
    }

    pub fn field_index(&self, selector: Symbol) -> Option<usize> {
        self.map.get(selector)
    }

    pub fn field_info(&self, index: usize) -> FieldInfo {
        self.map.info(index)
    }

    pub fn read(&self, index: usize) -> Value {
        self.values[index].clone()
    }

    pub fn write(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn put_field(
        &mut self,
        selector: Symbol,
        value: Value,
        flags: SlotFlags,
    ) -> RuntimeResult<usize> {
        if self.has_slot(selector) {
            return Err(RuntimeError::DuplicateSlot { selector });
        }
        let index = Arc::make_mut(&mut self.map).put(selector, flags)?;
        debug_assert_eq!(index, self.values.len());
        self.values.push(value);
        Ok(index)
    }

    /// Removes a native field, unsharing the layout first.
    pub fn remove_field(&mut self, selector: Symbol) -> Option<Value> {
        let index = self.map.get(selector)?;
        self.map = Arc::new(self.map.without(index));
        Some(self.values.remove(index))
    }

    pub fn methods(&self) -> &MethodDictionary {
        &self.methods
    }

    pub fn add_method(&mut self, method: Arc<Method>) -> RuntimeResult<()> {
        if self.has_slot(method.name) {
            return Err(RuntimeError::DuplicateSlot {
                selector: method.name,
            });
        }
        self.methods.insert(method);
        Ok(())
    }

    pub fn grab_method(&self, selector: Symbol) -> Option<Arc<Method>> {
        self.methods.get(selector).cloned()
    }

    pub fn remove_method(&mut self, selector: Symbol) -> Option<Arc<Method>> {
        self.methods.remove(selector)
    }

    pub fn custom_fields(&self) -> &[CustomField] {
        &self.custom
    }

    fn custom_index(&self, selector: Symbol) -> Option<usize> {
        self.custom.iter().position(|f| f.name == selector)
    }

    pub fn add_custom(
        &mut self,
        selector: Symbol,
        field: Value,
    ) -> RuntimeResult<()> {
        if self.has_slot(selector) {
            return Err(RuntimeError::DuplicateSlot { selector });
        }
        self.custom.push(CustomField {
            name: selector,
            field,
        });
        Ok(())
    }

    pub fn grab_custom(&self, selector: Symbol) -> Option<Value> {
        self.custom_index(selector)
            .map(|i| self.custom[i].field.clone())
    }

    pub fn remove_custom(&mut self, selector: Symbol) -> Option<Value> {
        let index = self.custom_index(selector)?;
        Some(self.custom.remove(index).field)
    }

    /// Storage for a clone: the layout is shared, values are copied and the
    /// custom fields are returned separately so the caller can
    /// re-instantiate each one against the new host.
    pub fn clone_layout(&self) -> (SlotStorage, Vec<CustomField>) {
        let storage = SlotStorage {
            map: Arc::clone(&self.map),
            values: self.values.clone(),
            methods: self.methods.clone(),
            custom: Vec::new(),
        };
        (storage, self.custom.clone())
    }

    pub fn shares_layout_with(&self, other: &SlotStorage) -> bool {
        Arc::ptr_eq(&self.map, &other.map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::intern(s)
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let mut storage = SlotStorage::new();
        storage
            .put_field(sym("x"), Value::Fixnum(1), SlotFlags::MUTABLE)
            .unwrap();
        let err = storage
            .put_field(sym("x"), Value::Fixnum(2), SlotFlags::MUTABLE)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::DuplicateSlot { .. }));
        assert_eq!(storage.read(0).as_fixnum(), Some(1));
    }

    #[test]
    fn selector_occupies_one_table() {
        let mut storage = SlotStorage::new();
        storage
            .put_field(sym("a"), Value::Nil, SlotFlags::MUTABLE)
            .unwrap();
        assert!(storage.add_custom(sym("a"), Value::Nil).is_err());
        storage.add_custom(sym("b"), Value::Nil).unwrap();
        assert!(
            storage
                .put_field(sym("b"), Value::Nil, SlotFlags::empty())
                .is_err()
        );
        assert!(storage.has_slot(sym("b")));
        assert_eq!(storage.remove_custom(sym("b")).map(|_| ()), Some(()));
        assert!(!storage.has_slot(sym("b")));
    }

    #[test]
    fn clone_shares_layout_not_values() {
        let mut original = SlotStorage::new();
        original
            .put_field(sym("x"), Value::Fixnum(1), SlotFlags::MUTABLE)
            .unwrap();
        original.add_custom(sym("c"), Value::Fixnum(7)).unwrap();

        let (mut copy, custom) = original.clone_layout();
        assert!(copy.shares_layout_with(&original));
        assert_eq!(custom.len(), 1);
        assert!(copy.custom_fields().is_empty());

        copy.write(0, Value::Fixnum(9));
        assert_eq!(original.read(0).as_fixnum(), Some(1));

        // growing the clone's layout must not leak into the original
        copy.put_field(sym("y"), Value::Nil, SlotFlags::MUTABLE)
            .unwrap();
        assert!(!copy.shares_layout_with(&original));
        assert!(original.field_index(sym("y")).is_none());
    }

    #[test]
    fn removing_a_field_reindexes() {
        let mut storage = SlotStorage::new();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            storage
                .put_field(sym(name), Value::Fixnum(i as i64), SlotFlags::MUTABLE)
                .unwrap();
        }
        let (other, _) = storage.clone_layout();
        assert_eq!(storage.remove_field(sym("b")).unwrap().as_fixnum(), Some(1));
        let c = storage.field_index(sym("c")).unwrap();
        assert_eq!(storage.read(c).as_fixnum(), Some(2));
        assert_eq!(other.field_index(sym("b")), Some(1));
    }
}
