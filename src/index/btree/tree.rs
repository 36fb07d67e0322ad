//! Concurrent B+ tree built on the buffer pool.
//!
//! # Structure
//! ```text
//!                 ┌──────────────┐
//!                 │   internal   │   separator keys + child page ids
//!                 └──┬───────┬───┘
//!            ┌───────┘       └───────┐
//!      ┌─────▼─────┐           ┌─────▼─────┐
//!      │   leaf    │──next────▶│   leaf    │──next──▶ ...
//!      └───────────┘           └───────────┘
//!        (key, record id) pairs, strictly ascending
//! ```
//! All nodes are buffer pool pages; the root page id of each named tree is
//! recorded in the header page directory so an index survives restart.
//!
//! # Latch crabbing
//! A tree-level `RwLock<PageId>` protects the root page id. Readers take a
//! child's read latch before releasing the parent's and never hold more
//! than two page latches. Writers latch top-down and release every
//! ancestor (innermost first, root latch last) as soon as the current node
//! is safe: an insert cannot split it, or a remove cannot underflow it.
//! Unsafe ancestors stay latched until the split or merge cascade
//! resolves, so a cascade only ever touches pages it already holds.
//!
//! # Failure atomicity
//! Every page a cascade needs (fresh pages for a split, sibling pages for
//! a merge, the header page for a root change) is acquired before the
//! first byte of the tree is modified. If any acquisition fails, the
//! operation unwinds without leaving a half-split or half-merged tree.

use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockWriteGuard};

use crate::buffer::{BufferPoolManager, PageWriteGuard};
use crate::common::config::HEADER_PAGE_ID;
use crate::common::{Error, PageId, RecordId, Result};
use crate::index::btree::internal::{InternalPage, InternalPageMut};
use crate::index::btree::iterator::IndexIterator;
use crate::index::btree::key::IndexKey;
use crate::index::btree::leaf::{LeafPage, LeafPageMut};
use crate::index::btree::node;
use crate::storage::page::{HeaderPage, HeaderPageMut, PageType, MAX_INDEX_NAME_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOp {
    Insert,
    Remove,
}

// ============================================================================
// Write context
// ============================================================================

/// Per-operation latch set for a mutating tree operation.
///
/// `path` holds the write-latched descent path, outermost first; the last
/// entry is the target leaf. `root_lock` is held exactly while `path[0]`
/// is the true root. `side` collects auxiliary guards (siblings, fresh
/// pages, the header page) that must stay latched until the operation
/// finishes. Pages queued in `deleted` are returned to the disk manager
/// only after every guard has dropped, since a page cannot be deleted
/// while pinned; one that is still pinned even then (a scan can grab it
/// in the gap) is parked on `pending` for a later retry.
struct WriteContext<'a> {
    bpm: &'a BufferPoolManager,
    pending: &'a Mutex<Vec<PageId>>,
    root_lock: Option<RwLockWriteGuard<'a, PageId>>,
    path: Vec<PageWriteGuard<'a>>,
    side: Vec<PageWriteGuard<'a>>,
    deleted: Vec<PageId>,
}

impl<'a> WriteContext<'a> {
    fn new(
        bpm: &'a BufferPoolManager,
        pending: &'a Mutex<Vec<PageId>>,
        root_lock: RwLockWriteGuard<'a, PageId>,
    ) -> Self {
        Self {
            bpm,
            pending,
            root_lock: Some(root_lock),
            path: Vec::new(),
            side: Vec::new(),
            deleted: Vec::new(),
        }
    }

    fn root_id(&self) -> PageId {
        **self
            .root_lock
            .as_ref()
            .expect("root latch already released")
    }

    fn set_root(&mut self, page_id: PageId) {
        **self
            .root_lock
            .as_mut()
            .expect("root latch already released") = page_id;
    }

    /// Whether `path[0]` is still the true root.
    fn holds_root(&self) -> bool {
        self.root_lock.is_some()
    }

    /// Release every latched ancestor of the current (last) node,
    /// innermost first, then the root latch.
    fn release_ancestors(&mut self) {
        let Some(current) = self.path.pop() else {
            return;
        };
        while let Some(ancestor) = self.path.pop() {
            drop(ancestor);
        }
        self.root_lock = None;
        self.path.push(current);
    }
}

impl Drop for WriteContext<'_> {
    fn drop(&mut self) {
        // Innermost page first, root latch last
        while let Some(guard) = self.path.pop() {
            drop(guard);
        }
        while let Some(guard) = self.side.pop() {
            drop(guard);
        }
        self.root_lock = None;

        // Emptied-out pages are unpinned now and can be deallocated. A
        // delete that fails (a concurrent scan re-pinned the page in the
        // instant since the guard dropped) is retried by a later write.
        for page_id in self.deleted.drain(..) {
            if self.bpm.delete_page(page_id).is_err() {
                self.pending.lock().push(page_id);
            }
        }
    }
}

// ============================================================================
// Merge planning
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum RootAction {
    /// An internal root shrank to one child; that child becomes the root.
    Collapse,
    /// The root leaf emptied; the tree becomes empty.
    Clear,
}

struct MergeStep<'a> {
    level: usize,
    node_index: usize,
    sibling_index: usize,
    sibling: PageWriteGuard<'a>,
    /// Coalesce into one node if true, otherwise redistribute one entry.
    coalesce: bool,
}

struct MergePlan<'a> {
    steps: Vec<MergeStep<'a>>,
    root_action: Option<RootAction>,
    header: Option<PageWriteGuard<'a>>,
}

// ============================================================================
// BPlusTree
// ============================================================================

/// A disk-resident, unique-key ordered index.
///
/// Thread-safe: any number of threads may call `get`, `insert`, `remove`
/// and iterate concurrently. Duplicate inserts and missing-key removes
/// are ordinary `false` outcomes; only buffer pool exhaustion or I/O
/// failures surface as errors, and a failed operation never leaves the
/// tree partially restructured.
///
/// The buffer pool must hold at least `tree height + 4` frames for
/// mutating operations to make progress.
pub struct BPlusTree<K: IndexKey> {
    name: String,
    bpm: Arc<BufferPoolManager>,
    root_page_id: RwLock<PageId>,
    /// Pages whose delete lost a race with a pin, awaiting another try.
    pending_free: Mutex<Vec<PageId>>,
    leaf_max_size: usize,
    internal_max_size: usize,
    _key: PhantomData<K>,
}

impl<K: IndexKey> BPlusTree<K> {
    /// Open the named index, creating its header directory entry lazily on
    /// first insert. The root recorded under `name` (if any) is reloaded,
    /// so a tree built in an earlier session keeps its contents.
    ///
    /// # Panics
    /// Panics if `max_size + 1` entries of the key width do not fit in a
    /// page (leaf minimum 2, internal minimum 3).
    pub fn new(
        name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let name = name.into();
        if name.len() > MAX_INDEX_NAME_LEN {
            return Err(Error::IndexNameTooLong(name));
        }

        let root = Self::load_root(&bpm, &name)?;

        Ok(Self {
            name,
            bpm,
            root_page_id: RwLock::new(root),
            pending_free: Mutex::new(Vec::new()),
            leaf_max_size,
            internal_max_size,
            _key: PhantomData,
        })
    }

    /// Look up (and on first use, format) the header page directory.
    fn load_root(bpm: &BufferPoolManager, name: &str) -> Result<PageId> {
        match bpm.fetch_page_write(HEADER_PAGE_ID) {
            Ok(mut guard) => {
                if guard.header().page_type != PageType::Header {
                    // Freshly allocated, never formatted
                    HeaderPageMut::init(&mut guard);
                    return Ok(PageId::INVALID);
                }
                let directory = HeaderPage::new(&guard);
                Ok(directory.root_of(name).unwrap_or(PageId::INVALID))
            }
            Err(Error::PageNotFound(_)) => {
                let mut guard = bpm.new_page()?;
                debug_assert_eq!(guard.page_id(), HEADER_PAGE_ID);
                HeaderPageMut::init(&mut guard);
                Ok(PageId::INVALID)
            }
            Err(e) => Err(e),
        }
    }

    /// The index name, as recorded in the header page directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current root page id (invalid when the tree is empty).
    pub fn root_page_id(&self) -> PageId {
        *self.root_page_id.read()
    }

    pub fn is_empty(&self) -> bool {
        !self.root_page_id.read().is_valid()
    }

    // ========================================================================
    // Point lookup
    // ========================================================================

    /// Look up the record stored under `key`.
    pub fn get(&self, key: &K) -> Result<Option<RecordId>> {
        let root_latch = self.root_page_id.read();
        let root_id = *root_latch;
        if !root_id.is_valid() {
            return Ok(None);
        }

        let mut guard = self.bpm.fetch_page_read(root_id)?;
        drop(root_latch);

        loop {
            if node::is_leaf(guard.as_slice()) {
                let leaf = LeafPage::<K>::new(guard.as_slice());
                return Ok(leaf.lookup(key));
            }
            let child = InternalPage::<K>::new(guard.as_slice()).lookup(key);
            // Crab: the child latch is taken before `guard` is replaced
            guard = self.bpm.fetch_page_read(child)?;
        }
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Insert a key/record pair. Returns false if `key` already exists.
    pub fn insert<'a>(&'a self, key: &K, record: &RecordId) -> Result<bool> {
        self.sweep_pending_free();
        let mut ctx =
            WriteContext::new(self.bpm.as_ref(), &self.pending_free, self.root_page_id.write());

        if !ctx.root_id().is_valid() {
            return self.start_new_tree(&mut ctx, key, record);
        }

        self.descend_for_write(&mut ctx, key, WriteOp::Insert)?;

        let needs_split = {
            let guard = ctx.path.last_mut().expect("descent produced no leaf");
            let mut leaf = LeafPageMut::<K>::new(guard.as_mut_slice());
            if !leaf.insert(key, record) {
                return Ok(false);
            }
            leaf.size() > leaf.max_size()
        };

        if needs_split {
            self.split_cascade(&mut ctx, key)?;
        }
        Ok(true)
    }

    /// First insert into an empty tree: allocate the root leaf and record
    /// it in the header directory.
    fn start_new_tree<'a>(
        &'a self,
        ctx: &mut WriteContext<'a>,
        key: &K,
        record: &RecordId,
    ) -> Result<bool> {
        let mut header = self.bpm.fetch_page_write(HEADER_PAGE_ID)?;
        let mut leaf_guard = self.bpm.new_page()?;
        let leaf_id = leaf_guard.page_id();

        {
            let mut leaf = LeafPageMut::<K>::init(&mut leaf_guard, self.leaf_max_size);
            leaf.insert(key, record);
        }

        if let Err(e) = self.write_root_record(&mut header, leaf_id) {
            ctx.side.push(leaf_guard);
            ctx.side.push(header);
            ctx.deleted.push(leaf_id);
            return Err(e);
        }

        ctx.set_root(leaf_id);
        ctx.side.push(leaf_guard);
        ctx.side.push(header);
        Ok(true)
    }

    /// Retry deallocation of pages whose delete was blocked by a pin.
    /// Anything still pinned stays queued for the next write.
    fn sweep_pending_free(&self) {
        let mut pending = self.pending_free.lock();
        if pending.is_empty() {
            return;
        }
        pending.retain(|&page_id| self.bpm.delete_page(page_id).is_err());
    }

    /// Record the tree's root under its name in the header directory.
    fn write_root_record(&self, header: &mut PageWriteGuard<'_>, root: PageId) -> Result<()> {
        let mut directory = HeaderPageMut::new(header);
        if !directory.update_record(&self.name, root) {
            directory.insert_record(&self.name, root)?;
        }
        Ok(())
    }

    /// Split the overflowed leaf and push separators upward through the
    /// retained ancestors. Every fresh page (and the header latch, if the
    /// root splits) is acquired first; on failure the leaf insert is
    /// undone and nothing else has been touched.
    fn split_cascade<'a>(&'a self, ctx: &mut WriteContext<'a>, key: &K) -> Result<()> {
        // Count how far the cascade reaches: each full retained ancestor
        // will overflow in turn when it receives a separator.
        let mut fresh_needed = 1;
        let splitting_root;
        if ctx.path.len() == 1 {
            splitting_root = true;
        } else {
            let mut level = ctx.path.len() - 2;
            loop {
                let data = ctx.path[level].as_slice();
                if node::node_size(data) < node::node_max_size(data) {
                    splitting_root = false;
                    break;
                }
                fresh_needed += 1;
                if level == 0 {
                    splitting_root = true;
                    break;
                }
                level -= 1;
            }
        }
        if splitting_root {
            debug_assert!(ctx.holds_root(), "root split without the root latch");
            fresh_needed += 1;
        }

        // Acquire everything before mutating anything
        let mut header = if splitting_root {
            match self.bpm.fetch_page_write(HEADER_PAGE_ID) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    self.undo_leaf_insert(ctx, key);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let mut fresh: Vec<PageWriteGuard<'a>> = Vec::with_capacity(fresh_needed);
        for _ in 0..fresh_needed {
            match self.bpm.new_page() {
                Ok(guard) => fresh.push(guard),
                Err(e) => {
                    self.undo_leaf_insert(ctx, key);
                    for guard in fresh {
                        let id = guard.page_id();
                        ctx.side.push(guard);
                        ctx.deleted.push(id);
                    }
                    if let Some(guard) = header.take() {
                        ctx.side.push(guard);
                    }
                    return Err(e);
                }
            }
        }

        // Split the leaf
        let mut level = ctx.path.len() - 1;
        let right_id = fresh[0].page_id();
        let mut old_child_id = ctx.path[level].page_id();
        let mut new_child_id = right_id;
        let mut separator = {
            let mut left = LeafPageMut::<K>::new(ctx.path[level].as_mut_slice());
            let mut right = LeafPageMut::<K>::init(&mut fresh[0], self.leaf_max_size);
            left.split_into(&mut right, right_id)
        };

        // Push the separator upward, splitting full ancestors as we go
        let mut next_fresh = 1;
        loop {
            if level == 0 {
                // The split node was the root: grow a new root above it
                let new_root_id = fresh[next_fresh].page_id();
                {
                    let mut new_root =
                        InternalPageMut::<K>::init(&mut fresh[next_fresh], self.internal_max_size);
                    new_root.populate_new_root(old_child_id, &separator, new_child_id);
                }
                ctx.set_root(new_root_id);
                let mut header_guard = header.take().expect("root split without header latch");
                self.write_root_record(&mut header_guard, new_root_id)?;
                ctx.side.push(header_guard);
                break;
            }

            level -= 1;
            let overflowed = {
                let mut parent = InternalPageMut::<K>::new(ctx.path[level].as_mut_slice());
                let new_size = parent.insert_node_after(old_child_id, &separator, new_child_id);
                new_size > parent.max_size()
            };
            if !overflowed {
                break;
            }

            let right_id = fresh[next_fresh].page_id();
            {
                let mut left = InternalPageMut::<K>::new(ctx.path[level].as_mut_slice());
                let mut right =
                    InternalPageMut::<K>::init(&mut fresh[next_fresh], self.internal_max_size);
                separator = left.split_into(&mut right);
            }
            old_child_id = ctx.path[level].page_id();
            new_child_id = right_id;
            next_fresh += 1;
        }

        // Fresh pages stay latched until the operation unwinds
        for guard in fresh {
            ctx.side.push(guard);
        }
        Ok(())
    }

    fn undo_leaf_insert(&self, ctx: &mut WriteContext<'_>, key: &K) {
        if let Some(guard) = ctx.path.last_mut() {
            let mut leaf = LeafPageMut::<K>::new(guard.as_mut_slice());
            leaf.remove(key);
        }
    }

    // ========================================================================
    // Remove
    // ========================================================================

    /// Remove a key. Returns false if `key` is absent, in which case the
    /// tree's pages are left byte-for-byte unchanged.
    pub fn remove<'a>(&'a self, key: &K) -> Result<bool> {
        self.sweep_pending_free();
        let mut ctx =
            WriteContext::new(self.bpm.as_ref(), &self.pending_free, self.root_page_id.write());

        if !ctx.root_id().is_valid() {
            return Ok(false);
        }

        self.descend_for_write(&mut ctx, key, WriteOp::Remove)?;

        {
            let guard = ctx.path.last().expect("descent produced no leaf");
            let leaf = LeafPage::<K>::new(guard.as_slice());
            if leaf.lookup(key).is_none() {
                return Ok(false);
            }
        }

        // Latch every sibling (and the header, on a root change) the
        // cascade will touch before deleting the entry.
        let plan = self.plan_merge(&ctx)?;

        {
            let guard = ctx.path.last_mut().expect("descent produced no leaf");
            let mut leaf = LeafPageMut::<K>::new(guard.as_mut_slice());
            leaf.remove(key);
        }

        self.execute_merge(&mut ctx, plan)?;
        Ok(true)
    }

    /// Decide the full merge/redistribute cascade up front. Sizes below
    /// the removal point are predicted (each coalesce costs its parent one
    /// entry), so the plan is exact: every latched page is held and cannot
    /// change underneath us.
    fn plan_merge<'a>(&'a self, ctx: &WriteContext<'a>) -> Result<MergePlan<'a>> {
        let mut plan = MergePlan {
            steps: Vec::new(),
            root_action: None,
            header: None,
        };

        let leaf_level = ctx.path.len() - 1;
        let mut level = leaf_level;
        let mut predicted = node::node_size(ctx.path[level].as_slice()) - 1;

        loop {
            let is_leaf = level == leaf_level;

            if level == 0 {
                if ctx.holds_root() {
                    if is_leaf && predicted == 0 {
                        plan.root_action = Some(RootAction::Clear);
                    } else if !is_leaf && predicted == 1 {
                        plan.root_action = Some(RootAction::Collapse);
                    }
                }
                break;
            }

            let max = node::node_max_size(ctx.path[level].as_slice());
            let min = max / 2;
            let underflow = if is_leaf {
                predicted < min
            } else {
                predicted <= min
            };
            if !underflow {
                break;
            }

            let node_id = ctx.path[level].page_id();
            let parent = InternalPage::<K>::new(ctx.path[level - 1].as_slice());
            let node_index = parent
                .child_index(node_id)
                .expect("node missing from its parent");
            let sibling_index = if node_index > 0 { node_index - 1 } else { 1 };
            let sibling_id = parent.child_at(sibling_index);

            let sibling = self.bpm.fetch_page_write(sibling_id)?;
            let sibling_size = node::node_size(sibling.as_slice());
            let coalesce = predicted + sibling_size <= max;

            plan.steps.push(MergeStep {
                level,
                node_index,
                sibling_index,
                sibling,
                coalesce,
            });

            if !coalesce {
                break;
            }

            // The coalesce removes one separator from the parent
            level -= 1;
            predicted = node::node_size(ctx.path[level].as_slice()) - 1;
        }

        if plan.root_action.is_some() {
            plan.header = Some(self.bpm.fetch_page_write(HEADER_PAGE_ID)?);
        }
        Ok(plan)
    }

    /// Apply a planned cascade bottom-up. The lower-indexed node of each
    /// pair survives a coalesce; redistribution rewrites the parent's
    /// separator to the new boundary key.
    fn execute_merge<'a>(&'a self, ctx: &mut WriteContext<'a>, mut plan: MergePlan<'a>) -> Result<()> {
        let leaf_level = ctx.path.len() - 1;

        for mut step in plan.steps.drain(..) {
            let level = step.level;
            let (upper, rest) = ctx.path.split_at_mut(level);
            let parent_guard = &mut upper[level - 1];
            let node_guard = &mut rest[0];
            let node_id = node_guard.page_id();
            let sibling_id = step.sibling.page_id();

            let mut parent = InternalPageMut::<K>::new(parent_guard.as_mut_slice());

            if level == leaf_level {
                let mut node = LeafPageMut::<K>::new(node_guard.as_mut_slice());
                let mut sibling = LeafPageMut::<K>::new(step.sibling.as_mut_slice());
                if step.coalesce {
                    if step.node_index > 0 {
                        node.move_all_to(&mut sibling);
                        parent.remove(step.node_index);
                        ctx.deleted.push(node_id);
                    } else {
                        sibling.move_all_to(&mut node);
                        parent.remove(step.sibling_index);
                        ctx.deleted.push(sibling_id);
                    }
                } else if step.node_index > 0 {
                    sibling.move_last_to_front_of(&mut node);
                    let new_sep = node.key_at(0);
                    parent.set_key_at(step.node_index, &new_sep);
                } else {
                    sibling.move_first_to_end_of(&mut node);
                    let new_sep = sibling.key_at(0);
                    parent.set_key_at(step.sibling_index, &new_sep);
                }
            } else {
                let mut node = InternalPageMut::<K>::new(node_guard.as_mut_slice());
                let mut sibling = InternalPageMut::<K>::new(step.sibling.as_mut_slice());
                if step.coalesce {
                    if step.node_index > 0 {
                        let middle = parent.key_at(step.node_index);
                        node.move_all_to(&mut sibling, &middle);
                        parent.remove(step.node_index);
                        ctx.deleted.push(node_id);
                    } else {
                        let middle = parent.key_at(step.sibling_index);
                        sibling.move_all_to(&mut node, &middle);
                        parent.remove(step.sibling_index);
                        ctx.deleted.push(sibling_id);
                    }
                } else if step.node_index > 0 {
                    let middle = parent.key_at(step.node_index);
                    let sibling_size = sibling.size();
                    let new_sep = sibling.key_at(sibling_size - 1);
                    let donated = sibling.child_at(sibling_size - 1);
                    node.set_key_at(0, &middle);
                    node.insert_front(&new_sep, donated);
                    sibling.remove(sibling_size - 1);
                    parent.set_key_at(step.node_index, &new_sep);
                } else {
                    let middle = parent.key_at(step.sibling_index);
                    let new_sep = sibling.key_at(1);
                    let donated = sibling.child_at(0);
                    node.push_last(&middle, donated);
                    sibling.remove(0);
                    parent.set_key_at(step.sibling_index, &new_sep);
                }
            }

            ctx.side.push(step.sibling);
        }

        if let Some(action) = plan.root_action {
            let old_root_id = ctx.path[0].page_id();
            let new_root = match action {
                RootAction::Clear => PageId::INVALID,
                RootAction::Collapse => {
                    let root = InternalPage::<K>::new(ctx.path[0].as_slice());
                    debug_assert_eq!(root.size(), 1);
                    root.child_at(0)
                }
            };
            ctx.set_root(new_root);
            let mut header = plan.header.take().expect("root change without header latch");
            self.write_root_record(&mut header, new_root)?;
            ctx.side.push(header);
            ctx.deleted.push(old_root_id);
        }

        Ok(())
    }

    // ========================================================================
    // Write descent
    // ========================================================================

    /// Crab down to the target leaf with write latches, releasing
    /// ancestors whenever the newly latched child is safe for `op`.
    fn descend_for_write<'a>(
        &'a self,
        ctx: &mut WriteContext<'a>,
        key: &K,
        op: WriteOp,
    ) -> Result<()> {
        let root = self.bpm.fetch_page_write(ctx.root_id())?;
        ctx.path.push(root);

        loop {
            let child_id = {
                let guard = ctx.path.last().expect("descent path is empty");
                if node::is_leaf(guard.as_slice()) {
                    return Ok(());
                }
                InternalPage::<K>::new(guard.as_slice()).lookup(key)
            };

            let child = self.bpm.fetch_page_write(child_id)?;
            let safe = Self::is_safe(child.as_slice(), op);
            ctx.path.push(child);
            if safe {
                ctx.release_ancestors();
            }
        }
    }

    /// A node is safe when the pending operation cannot propagate a
    /// structural change into its parent.
    fn is_safe(data: &[u8], op: WriteOp) -> bool {
        let size = node::node_size(data);
        let max = node::node_max_size(data);
        let min = max / 2;
        if node::is_leaf(data) {
            match op {
                WriteOp::Insert => size + 1 < max,
                WriteOp::Remove => size > min,
            }
        } else {
            match op {
                WriteOp::Insert => size + 1 <= max,
                WriteOp::Remove => size > min + 1,
            }
        }
    }

    // ========================================================================
    // Range iteration
    // ========================================================================

    /// Cursor at the smallest key in the tree.
    pub fn begin(&self) -> Result<IndexIterator<'_, K>> {
        self.leftmost_descent(None)
    }

    /// Cursor at the first key >= `key`.
    pub fn begin_at(&self, key: &K) -> Result<IndexIterator<'_, K>> {
        self.leftmost_descent(Some(key))
    }

    /// The terminal cursor.
    pub fn end(&self) -> IndexIterator<'_, K> {
        IndexIterator::end(self.bpm.as_ref())
    }

    fn leftmost_descent(&self, key: Option<&K>) -> Result<IndexIterator<'_, K>> {
        let root_latch = self.root_page_id.read();
        let root_id = *root_latch;
        if !root_id.is_valid() {
            return Ok(IndexIterator::end(self.bpm.as_ref()));
        }

        let mut guard = self.bpm.fetch_page_read(root_id)?;
        drop(root_latch);

        while !node::is_leaf(guard.as_slice()) {
            let view = InternalPage::<K>::new(guard.as_slice());
            let child = match key {
                Some(key) => view.lookup(key),
                None => view.child_at(0),
            };
            guard = self.bpm.fetch_page_read(child)?;
        }

        loop {
            let leaf = LeafPage::<K>::new(guard.as_slice());
            let index = match key {
                Some(key) => leaf.key_index(key),
                None => 0,
            };
            let size = leaf.size();
            if index < size {
                let page_id = guard.page_id();
                return Ok(IndexIterator::new(self.bpm.as_ref(), page_id, index, size));
            }

            // The key sorts past this leaf's last entry: the first key >= it
            // is the front of the next leaf. No next leaf means the cursor
            // is the end sentinel.
            let next = leaf.next_page_id();
            if !next.is_valid() {
                return Ok(IndexIterator::end(self.bpm.as_ref()));
            }
            guard = self.bpm.fetch_page_read(next)?;
        }
    }
}
