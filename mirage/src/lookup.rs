use std::sync::Arc;

use crate::{
    Heap, HeapObject, Method, ObjectId, SlotFlags, SlotStorage, Symbol, Value,
};

/// What a selector resolved to inside one object's slot storage.
#[derive(Debug, Clone)]
pub enum Slot {
    Field { index: usize, flags: SlotFlags },
    /// `x:=` matched native field `x`
    Mutator { index: usize, flags: SlotFlags },
    Method(Arc<Method>),
    Custom(Value),
    /// `x:=` matched custom field `x`
    CustomMutator(Value),
}

/// Outcome of walking a parent chain.
#[derive(Debug, Clone)]
pub enum LookupResult {
    Found {
        /// the object owning the slot, may differ from where the search
        /// started when it was found through a parent
        holder: ObjectId,
        slot: Slot,
    },
    /// The chain continues at a node with its own meta-level (a mirage or a
    /// non-object value); the search must be re-dispatched there.
    Delegate(Value),
    /// Top of the chain reached.
    None,
}

impl SlotStorage {
    pub fn find(&self, selector: Symbol) -> Option<Slot> {
        if let Some(index) = self.field_index(selector) {
            let flags = self.field_info(index).flags;
            return Some(Slot::Field { index, flags });
        }
        if let Some(method) = self.methods().get(selector) {
            return Some(Slot::Method(method.clone()));
        }
        if let Some(field) = self.grab_custom(selector) {
            return Some(Slot::Custom(field));
        }

        let target = selector.assignment_target()?;
        if let Some(index) = self.field_index(target) {
            let flags = self.field_info(index).flags;
            return Some(Slot::Mutator { index, flags });
        }
        self.grab_custom(target).map(Slot::CustomMutator)
    }
}

impl Heap {
    /// Search `start` and then its dynamic parents.
    ///
    /// `start` itself is always searched locally whatever its kind, which is
    /// what both the default semantics and the mirror root's escape path
    /// need. Plain parents are walked iteratively.
    pub fn search_dynamic(&self, start: ObjectId, selector: Symbol) -> LookupResult {
        let mut current = start;
        loop {
            if let Some(slot) = self.storage(current).find(selector) {
                return LookupResult::Found {
                    holder: current,
                    slot,
                };
            }
            let parent = match self.get(current) {
                HeapObject::Object(object) => &object.dynamic_parent,
                HeapObject::Mirage(mirage) => &mirage.object.dynamic_parent,
                HeapObject::Frame(_) => return LookupResult::None,
            };
            match parent {
                Value::Nil => return LookupResult::None,
                Value::Object(id) if self.is_plain_object(*id) => current = *id,
                other => return LookupResult::Delegate(other.clone()),
            }
        }
    }

    /// Search `start` and then its lexical parents.
    pub fn search_lexical(&self, start: ObjectId, selector: Symbol) -> LookupResult {
        let mut current = start;
        loop {
            if let Some(slot) = self.storage(current).find(selector) {
                return LookupResult::Found {
                    holder: current,
                    slot,
                };
            }
            match self.lexical_parent(current) {
                None => return LookupResult::None,
                Some(parent) if self.is_mirage(parent) => {
                    return LookupResult::Delegate(Value::Object(parent));
                }
                Some(parent) => current = parent,
            }
        }
    }

    /// The object at which a dynamic search for `selector` would stop.
    pub fn holder_of(&self, start: ObjectId, selector: Symbol) -> Option<ObjectId> {
        match self.search_dynamic(start, selector) {
            LookupResult::Found { holder, .. } => Some(holder),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HeapSettings, ParentLink, PrototypeObject};

    fn object(heap: &mut Heap, parent: Value, lexical: Option<ObjectId>) -> ObjectId {
        let family = heap.new_family();
        let object = PrototypeObject::new(parent, ParentLink::IsA, lexical, family);
        heap.allocate(HeapObject::Object(object))
    }

    fn define(heap: &mut Heap, id: ObjectId, name: &str, value: i64) {
        heap.storage_mut(id)
            .put_field(Symbol::intern(name), Value::Fixnum(value), SlotFlags::MUTABLE)
            .unwrap();
    }

    #[test]
    fn dynamic_search_reports_the_holder() {
        let mut heap = Heap::new(HeapSettings::default());
        let top = object(&mut heap, Value::Nil, None);
        define(&mut heap, top, "x", 1);
        let mid = object(&mut heap, Value::Object(top), None);
        let low = object(&mut heap, Value::Object(mid), None);

        match heap.search_dynamic(low, Symbol::intern("x")) {
            LookupResult::Found { holder, slot: Slot::Field { index, .. } } => {
                assert_eq!(holder, top);
                assert_eq!(index, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            heap.search_dynamic(low, Symbol::intern("nope")),
            LookupResult::None
        ));
    }

    #[test]
    fn assignment_selectors_find_mutators() {
        let mut heap = Heap::new(HeapSettings::default());
        let obj = object(&mut heap, Value::Nil, None);
        define(&mut heap, obj, "count", 0);
        assert!(matches!(
            heap.search_dynamic(obj, Symbol::intern("count:=")),
            LookupResult::Found { slot: Slot::Mutator { index: 0, .. }, .. }
        ));
    }

    #[test]
    fn non_object_parents_delegate() {
        let mut heap = Heap::new(HeapSettings::default());
        let obj = object(&mut heap, Value::Fixnum(3), None);
        assert!(matches!(
            heap.search_dynamic(obj, Symbol::intern("x")),
            LookupResult::Delegate(Value::Fixnum(3))
        ));
    }

    #[test]
    fn lexical_search_ignores_dynamic_parents() {
        let mut heap = Heap::new(HeapSettings::default());
        let outer = object(&mut heap, Value::Nil, None);
        define(&mut heap, outer, "v", 7);
        let parent = object(&mut heap, Value::Nil, None);
        define(&mut heap, parent, "w", 8);
        let inner = object(&mut heap, Value::Object(parent), Some(outer));

        assert_eq!(
            heap.holder_of(inner, Symbol::intern("w")),
            Some(parent)
        );
        assert!(matches!(
            heap.search_lexical(inner, Symbol::intern("v")),
            LookupResult::Found { holder, .. } if holder == outer
        ));
        assert!(matches!(
            heap.search_lexical(inner, Symbol::intern("w")),
            LookupResult::None
        ));
    }
}
