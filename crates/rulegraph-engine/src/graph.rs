//! The block arena.
//!
//! Blocks live in one map keyed by `BlockId`. Parent/child structure is kept
//! in both directions (`Block::inputs` / `Block::next` downwards,
//! `Block::parent` upwards) and every mutation here updates both sides.
//!
//! The graph knows nothing about types or the registry: it only enforces the
//! shape invariants (a block has at most one parent, no cycles, one child per
//! socket).

use std::collections::BTreeMap;

use rulegraph_catalog::TypeTag;

use crate::block::{Block, BlockId, BlockKind, ParentLink, Position, Socket};
use crate::error::EngineError;
use crate::variables::VariableId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockGraph {
    blocks: BTreeMap<BlockId, Block>,
    next_id: u32,
}

impl BlockGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(&id)
    }

    pub fn block(&self, id: BlockId) -> Result<&Block, EngineError> {
        self.blocks.get(&id).ok_or(EngineError::UnknownBlock(id))
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Result<&mut Block, EngineError> {
        self.blocks.get_mut(&id).ok_or(EngineError::UnknownBlock(id))
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn ids(&self) -> Vec<BlockId> {
        self.blocks.keys().copied().collect()
    }

    /// Output tag of whatever is plugged into `socket`, unset if nothing is.
    pub fn input_tag(&self, block: &Block, socket: Socket) -> TypeTag {
        block
            .input(socket)
            .and_then(|child| self.get(child))
            .map(|child| child.output.clone())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    pub fn insert(&mut self, kind: BlockKind, position: Position) -> BlockId {
        let id = self.allocate_id();
        self.blocks.insert(id, Block::new(id, kind, position));
        id
    }

    /// Next id after the highest handed out; once that runs past `u32::MAX`
    /// (a stored diagram may carry any id), the lowest free id instead.
    fn allocate_id(&mut self) -> BlockId {
        let mut candidate = self.next_id.checked_add(1);
        while let Some(id) = candidate {
            if !self.blocks.contains_key(&BlockId(id)) {
                self.next_id = id;
                return BlockId(id);
            }
            candidate = id.checked_add(1);
        }
        let lowest_free = (1..=u32::MAX)
            .find(|id| !self.blocks.contains_key(&BlockId(*id)))
            .unwrap_or(u32::MAX);
        BlockId(lowest_free)
    }

    /// Insert keeping a requested id when it is free (diagram loading).
    pub fn insert_with_id(&mut self, wanted: Option<BlockId>, kind: BlockKind, position: Position) -> BlockId {
        match wanted {
            Some(id) if id.0 != 0 && !self.blocks.contains_key(&id) => {
                self.blocks.insert(id, Block::new(id, kind, position));
                self.next_id = self.next_id.max(id.0);
                id
            }
            _ => self.insert(kind, position),
        }
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Plug `child` (which must be top-level) into `parent.socket`.
    ///
    /// A value already in the socket is detached and returned. A statement
    /// chain already in the socket is re-hung after the end of `child`'s chain.
    pub fn attach_input(
        &mut self,
        parent: BlockId,
        socket: Socket,
        child: BlockId,
        statement: bool,
    ) -> Result<Option<BlockId>, EngineError> {
        self.check_attachable(parent, child)?;
        let previous = self.block(parent)?.input(socket);
        let mut displaced = None;
        if let Some(prev) = previous {
            self.unlink(prev);
            if statement {
                let tail = self.chain_tail(child);
                self.link_next(tail, prev);
            } else {
                displaced = Some(prev);
            }
        }
        self.block_mut(parent)?.inputs.insert(socket, child);
        self.block_mut(child)?.parent = Some(ParentLink::Input(parent, socket));
        Ok(displaced)
    }

    /// Splice the chain starting at `child` (top-level) after `prev`; whatever
    /// followed `prev` now follows the end of that chain.
    pub fn attach_next(&mut self, prev: BlockId, child: BlockId) -> Result<(), EngineError> {
        self.check_attachable(prev, child)?;
        let rest = self.block(prev)?.next;
        if let Some(rest) = rest {
            self.unlink(rest);
            let tail = self.chain_tail(child);
            self.link_next(tail, rest);
        }
        self.link_next(prev, child);
        Ok(())
    }

    fn check_attachable(&self, parent: BlockId, child: BlockId) -> Result<(), EngineError> {
        self.block(parent)?;
        if self.block(child)?.parent.is_some() {
            return Err(EngineError::UnsupportedConfiguration(format!(
                "block {child} is still connected; disconnect it first"
            )));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(EngineError::UnsupportedConfiguration(format!(
                "connecting block {child} under block {parent} would form a cycle"
            )));
        }
        Ok(())
    }

    fn link_next(&mut self, prev: BlockId, child: BlockId) {
        if let Some(p) = self.blocks.get_mut(&prev) {
            p.next = Some(child);
        }
        if let Some(c) = self.blocks.get_mut(&child) {
            c.parent = Some(ParentLink::Next(prev));
        }
    }

    /// Cut `child` loose from its parent. Its own children (and the rest of
    /// its statement chain) come with it. Returns the former parent link.
    pub fn detach(&mut self, child: BlockId) -> Option<ParentLink> {
        self.unlink(child)
    }

    fn unlink(&mut self, child: BlockId) -> Option<ParentLink> {
        let link = self.blocks.get_mut(&child)?.parent.take()?;
        if let Some(parent) = self.blocks.get_mut(&link.block()) {
            match link {
                ParentLink::Input(_, socket) => {
                    parent.inputs.remove(&socket);
                }
                ParentLink::Next(_) => parent.next = None,
            }
        }
        Some(link)
    }

    /// Remove one block together with its inputs. A following statement takes
    /// the removed block's place in the chain. Returns every removed id.
    pub fn remove_block(&mut self, id: BlockId) -> Result<Vec<BlockId>, EngineError> {
        let position = self.block(id)?.position;
        let link = self.unlink(id);
        let follower = self.block(id)?.next;
        if let Some(follower) = follower {
            self.unlink(follower);
            match link {
                Some(ParentLink::Input(parent, socket)) => {
                    if let Some(p) = self.blocks.get_mut(&parent) {
                        p.inputs.insert(socket, follower);
                    }
                    if let Some(f) = self.blocks.get_mut(&follower) {
                        f.parent = Some(ParentLink::Input(parent, socket));
                    }
                }
                Some(ParentLink::Next(prev)) => self.link_next(prev, follower),
                None => {
                    if let Some(f) = self.blocks.get_mut(&follower) {
                        f.position = position;
                    }
                }
            }
        }
        let removed = self.subtree(id);
        for r in &removed {
            self.blocks.remove(r);
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// `id` and every block reachable through its inputs (statement bodies
    /// included, with their chains). Excludes `id`'s own `next`.
    pub fn subtree(&self, id: BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let Some(block) = self.get(cur) else { continue };
            out.push(cur);
            for (_, child) in block.inputs.iter().rev() {
                stack.push(*child);
                let mut next = self.get(*child).and_then(|b| b.next);
                while let Some(n) = next {
                    stack.push(n);
                    next = self.get(n).and_then(|b| b.next);
                }
            }
        }
        out
    }

    /// True when `ancestor` is above `id` (through inputs or `next` links).
    pub fn is_ancestor(&self, ancestor: BlockId, id: BlockId) -> bool {
        let mut cur = self.get(id).and_then(|b| b.parent);
        while let Some(link) = cur {
            let p = link.block();
            if p == ancestor {
                return true;
            }
            cur = self.get(p).and_then(|b| b.parent);
        }
        false
    }

    pub fn root_of(&self, id: BlockId) -> BlockId {
        let mut cur = id;
        while let Some(link) = self.get(cur).and_then(|b| b.parent) {
            cur = link.block();
        }
        cur
    }

    fn chain_tail(&self, id: BlockId) -> BlockId {
        let mut cur = id;
        while let Some(n) = self.get(cur).and_then(|b| b.next) {
            cur = n;
        }
        cur
    }

    /// Top-level blocks in canvas order: by y, then x, then id.
    pub fn top_blocks(&self) -> Vec<BlockId> {
        let mut tops: Vec<&Block> = self.blocks.values().filter(|b| b.parent.is_none()).collect();
        tops.sort_by_key(|b| (b.position.y, b.position.x, b.id));
        tops.into_iter().map(|b| b.id).collect()
    }

    /// Every block, parents before children, chains in order, top blocks in
    /// canvas order.
    pub fn pre_order(&self) -> Vec<BlockId> {
        let mut out = Vec::with_capacity(self.blocks.len());
        for top in self.top_blocks() {
            self.walk(top, &mut out, false);
        }
        out
    }

    /// Every block, children before parents.
    pub fn post_order(&self) -> Vec<BlockId> {
        let mut out = Vec::with_capacity(self.blocks.len());
        for top in self.top_blocks() {
            self.walk(top, &mut out, true);
        }
        out
    }

    fn walk(&self, start: BlockId, out: &mut Vec<BlockId>, post: bool) {
        let mut cur = Some(start);
        while let Some(id) = cur {
            let Some(block) = self.get(id) else { return };
            if !post {
                out.push(id);
            }
            for (_, child) in block.inputs.iter() {
                self.walk(*child, out, post);
            }
            if post {
                out.push(id);
            }
            cur = block.next;
        }
    }

    /// Getter blocks of `var`.
    pub fn getters_of(&self, var: &VariableId) -> Vec<BlockId> {
        self.blocks
            .values()
            .filter(|b| b.kind.is_getter_of(var))
            .map(|b| b.id)
            .collect()
    }

    /// Every block that reads or binds `var`.
    pub fn uses_of(&self, var: &VariableId) -> Vec<BlockId> {
        self.blocks
            .values()
            .filter(|b| b.kind.variable() == Some(var))
            .map(|b| b.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt() -> BlockKind {
        BlockKind::SetResult
    }

    #[test]
    fn remove_heals_statement_chain() {
        let mut g = BlockGraph::new();
        let a = g.insert(stmt(), Position::new(0, 0));
        let b = g.insert(stmt(), Position::default());
        let c = g.insert(stmt(), Position::default());
        g.attach_next(a, b).unwrap();
        g.attach_next(b, c).unwrap();

        let removed = g.remove_block(b).unwrap();
        assert_eq!(removed, vec![b]);
        assert_eq!(g.get(a).unwrap().next(), Some(c));
        assert_eq!(g.get(c).unwrap().parent(), Some(ParentLink::Next(a)));
    }

    #[test]
    fn removing_a_top_block_promotes_its_follower() {
        let mut g = BlockGraph::new();
        let a = g.insert(stmt(), Position::new(10, 20));
        let b = g.insert(stmt(), Position::default());
        g.attach_next(a, b).unwrap();
        g.remove_block(a).unwrap();
        let b = g.get(b).unwrap();
        assert!(b.is_top_level());
        assert_eq!(b.position, Position::new(10, 20));
    }

    #[test]
    fn statement_socket_splices_previous_chain() {
        let mut g = BlockGraph::new();
        let host = g.insert(BlockKind::If, Position::default());
        let first = g.insert(stmt(), Position::default());
        let second = g.insert(stmt(), Position::default());
        g.attach_input(host, Socket::Do, first, true).unwrap();
        let displaced = g.attach_input(host, Socket::Do, second, true).unwrap();
        assert_eq!(displaced, None);
        assert_eq!(g.get(host).unwrap().input(Socket::Do), Some(second));
        assert_eq!(g.get(second).unwrap().next(), Some(first));
    }

    #[test]
    fn value_socket_returns_displaced_child() {
        let mut g = BlockGraph::new();
        let host = g.insert(BlockKind::ListLength, Position::default());
        let a = g.insert(BlockKind::CurrentDate, Position::default());
        let b = g.insert(BlockKind::CurrentUser, Position::default());
        g.attach_input(host, Socket::List, a, false).unwrap();
        assert_eq!(g.attach_input(host, Socket::List, b, false).unwrap(), Some(a));
        assert!(g.get(a).unwrap().is_top_level());
    }

    #[test]
    fn cycles_are_refused() {
        let mut g = BlockGraph::new();
        let outer = g.insert(BlockKind::Negate, Position::default());
        let inner = g.insert(BlockKind::Negate, Position::default());
        g.attach_input(outer, Socket::Value, inner, false).unwrap();
        g.detach(outer);
        assert!(g.attach_input(inner, Socket::Value, outer, false).is_err());
    }

    #[test]
    fn orders_are_consistent() {
        let mut g = BlockGraph::new();
        let outer = g.insert(BlockKind::Negate, Position::default());
        let inner = g.insert(BlockKind::Boolean { value: true }, Position::default());
        g.attach_input(outer, Socket::Value, inner, false).unwrap();
        assert_eq!(g.pre_order(), vec![outer, inner]);
        assert_eq!(g.post_order(), vec![inner, outer]);
        assert_eq!(g.root_of(inner), outer);
        assert_eq!(g.subtree(outer), vec![outer, inner]);
    }

    #[test]
    fn ids_past_u32_max_fall_back_to_lowest_free() {
        let mut g = BlockGraph::new();
        let high = g.insert_with_id(
            Some(BlockId(u32::MAX)),
            BlockKind::CurrentDate,
            Position::default(),
        );
        assert_eq!(high, BlockId(u32::MAX));
        let first = g.insert(BlockKind::CurrentUser, Position::default());
        let second = g.insert(BlockKind::CurrentUser, Position::default());
        assert_eq!(first, BlockId(1));
        assert_eq!(second, BlockId(2));
        assert_eq!(g.len(), 3);
    }
}
