use std::fmt;

use log::debug;

use crate::{
    CallFrame, CloneFamily, Mirage, PrototypeObject, SlotStorage, Value,
    Visitable, Visitor,
};

/// Handle to a node in the [`Heap`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub enum HeapObject {
    Object(PrototypeObject),
    Frame(CallFrame),
    Mirage(Mirage),
}

#[derive(Debug, Clone)]
pub struct HeapSettings {
    /// arena slots reserved up front
    pub initial_capacity: usize,
    /// allocations since the last collection that make
    /// [`VM::maybe_collect`](crate::VM::maybe_collect) collect
    pub collect_threshold: usize,
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            collect_threshold: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GarbageCollectionStats {
    pub live: usize,
    pub freed: usize,
}

/// Single owning arena for every object node. Nodes reference each other
/// only through [`ObjectId`]s, so reference cycles (mirror <-> mirage) need
/// no special treatment: they are reclaimed together by [`Heap::collect`].
#[derive(Debug)]
pub struct Heap {
    entries: Vec<Option<HeapObject>>,
    free: Vec<u32>,
    next_family: u64,
    allocated_since_collect: usize,
    settings: HeapSettings,
}

struct MarkVisitor {
    marked: Vec<bool>,
    pending: Vec<ObjectId>,
}

impl Visitor for MarkVisitor {
    fn visit(&mut self, id: ObjectId) {
        let seen = &mut self.marked[id.index()];
        if !*seen {
            *seen = true;
            self.pending.push(id);
        }
    }
}

impl Heap {
    pub fn new(settings: HeapSettings) -> Self {
        Self {
            entries: Vec::with_capacity(settings.initial_capacity),
            free: Vec::new(),
            next_family: 0,
            allocated_since_collect: 0,
            settings,
        }
    }

    pub fn settings(&self) -> &HeapSettings {
        &self.settings
    }

    pub fn allocate(&mut self, object: HeapObject) -> ObjectId {
        self.allocated_since_collect += 1;
        match self.free.pop() {
            Some(index) => {
                self.entries[index as usize] = Some(object);
                ObjectId(index)
            }
            None => {
                self.entries.push(Some(object));
                ObjectId((self.entries.len() - 1) as u32)
            }
        }
    }

    pub fn new_family(&mut self) -> CloneFamily {
        self.next_family += 1;
        CloneFamily(self.next_family)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        matches!(self.entries.get(id.index()), Some(Some(_)))
    }

    pub fn live_count(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    pub fn should_collect(&self) -> bool {
        self.allocated_since_collect >= self.settings.collect_threshold
    }

    /// # Panics
    /// On a handle whose node was reclaimed; handles must be kept reachable
    /// from the roots handed to [`Heap::collect`].
    pub fn get(&self, id: ObjectId) -> &HeapObject {
        match self.entries.get(id.index()) {
            Some(Some(object)) => object,
            _ => panic!("dangling object handle {id}"),
        }
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut HeapObject {
        match self.entries.get_mut(id.index()) {
            Some(Some(object)) => object,
            _ => panic!("dangling object handle {id}"),
        }
    }

    /// The prototype-object part of objects and mirages.
    pub fn body(&self, id: ObjectId) -> Option<&PrototypeObject> {
        match self.get(id) {
            HeapObject::Object(object) => Some(object),
            HeapObject::Mirage(mirage) => Some(&mirage.object),
            HeapObject::Frame(_) => None,
        }
    }

    pub fn body_mut(&mut self, id: ObjectId) -> Option<&mut PrototypeObject> {
        match self.get_mut(id) {
            HeapObject::Object(object) => Some(object),
            HeapObject::Mirage(mirage) => Some(&mut mirage.object),
            HeapObject::Frame(_) => None,
        }
    }

    pub fn storage(&self, id: ObjectId) -> &SlotStorage {
        match self.get(id) {
            HeapObject::Object(object) => &object.slots,
            HeapObject::Mirage(mirage) => &mirage.object.slots,
            HeapObject::Frame(frame) => &frame.slots,
        }
    }

    pub fn storage_mut(&mut self, id: ObjectId) -> &mut SlotStorage {
        match self.get_mut(id) {
            HeapObject::Object(object) => &mut object.slots,
            HeapObject::Mirage(mirage) => &mut mirage.object.slots,
            HeapObject::Frame(frame) => &mut frame.slots,
        }
    }

    pub fn lexical_parent(&self, id: ObjectId) -> Option<ObjectId> {
        match self.get(id) {
            HeapObject::Object(object) => object.lexical_parent,
            HeapObject::Mirage(mirage) => mirage.object.lexical_parent,
            HeapObject::Frame(frame) => Some(frame.lexical_parent),
        }
    }

    pub fn is_plain_object(&self, id: ObjectId) -> bool {
        matches!(self.get(id), HeapObject::Object(_))
    }

    pub fn is_mirage(&self, id: ObjectId) -> bool {
        matches!(self.get(id), HeapObject::Mirage(_))
    }

    pub fn is_frame(&self, id: ObjectId) -> bool {
        matches!(self.get(id), HeapObject::Frame(_))
    }

    /// Mark from `roots`, then free every unmarked node.
    pub fn collect(&mut self, roots: &[Value]) -> GarbageCollectionStats {
        let mut visitor = MarkVisitor {
            marked: vec![false; self.entries.len()],
            pending: Vec::new(),
        };
        for root in roots {
            root.visit_edges(&mut visitor);
        }
        while let Some(id) = visitor.pending.pop() {
            self.get(id).visit_edges(&mut visitor);
        }

        let mut freed = 0;
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.is_some() && !visitor.marked[index] {
                *entry = None;
                self.free.push(index as u32);
                freed += 1;
            }
        }
        self.allocated_since_collect = 0;

        let stats = GarbageCollectionStats {
            live: self.live_count(),
            freed,
        };
        debug!("collected heap: {} live, {} freed", stats.live, stats.freed);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ParentLink, Symbol};

    fn orphan(heap: &mut Heap) -> PrototypeObject {
        let family = heap.new_family();
        PrototypeObject::new(Value::Nil, ParentLink::IsA, None, family)
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut heap = Heap::new(HeapSettings::default());
        let a = orphan(&mut heap);
        let a = heap.allocate(HeapObject::Object(a));
        let b = orphan(&mut heap);
        let b = heap.allocate(HeapObject::Object(b));

        let stats = heap.collect(&[Value::Object(a)]);
        assert_eq!(stats, GarbageCollectionStats { live: 1, freed: 1 });
        assert!(heap.contains(a));
        assert!(!heap.contains(b));

        let c = orphan(&mut heap);
        let c = heap.allocate(HeapObject::Object(c));
        assert_eq!(c, b);
    }

    #[test]
    fn fields_and_parents_keep_objects_alive() {
        let mut heap = Heap::new(HeapSettings::default());
        let parent = orphan(&mut heap);
        let parent = heap.allocate(HeapObject::Object(parent));
        let target = orphan(&mut heap);
        let target = heap.allocate(HeapObject::Object(target));

        let family = heap.new_family();
        let mut child = PrototypeObject::new(
            Value::Object(parent),
            ParentLink::IsA,
            None,
            family,
        );
        child
            .slots
            .put_field(
                Symbol::intern("f"),
                Value::table(&[Value::Object(target)]),
                crate::SlotFlags::MUTABLE,
            )
            .unwrap();
        let child = heap.allocate(HeapObject::Object(child));

        let stats = heap.collect(&[Value::Object(child)]);
        assert_eq!(stats.freed, 0);
        assert!(heap.contains(parent) && heap.contains(target));
    }

    #[test]
    #[should_panic(expected = "dangling object handle")]
    fn dangling_handles_panic() {
        let mut heap = Heap::new(HeapSettings::default());
        let a = orphan(&mut heap);
        let a = heap.allocate(HeapObject::Object(a));
        heap.collect(&[]);
        heap.get(a);
    }
}
