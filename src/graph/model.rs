use std::collections::BTreeSet;

/// Glyph that marks a relay in map text and is the default relay name.
pub const RELAY_GLYPH: &str = "◇";

pub const DEFAULT_ECONOMY: u64 = 10_000;
pub const DEFAULT_GUARD: u64 = 100;

/// Whether a node is a city or a relay waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    City,
    Relay,
}

/// Position of a node inside a [`MapGraph`] arena.
///
/// Indices are only meaningful for the graph that produced them; every
/// reparse builds a fresh arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub usize);

/// A city or relay on the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Export id. Reassigned on every reparse.
    pub id: u32,
    pub kind: NodeKind,
    /// Short label: the matched token for cities, the glyph for relays.
    pub name: String,
    /// Identifier used in the exported script. Defaults to `name`.
    pub full_name: String,
    pub economy: u64,
    pub guard: u64,
    /// Undirected neighbours. Kept symmetric by [`MapGraph::connect`] and
    /// [`MapGraph::disconnect`].
    pub connections: BTreeSet<NodeIndex>,
    /// `(line, column)` of the token, column counted in chars.
    pub position: Option<(usize, usize)>,
}

impl Node {
    pub fn new(kind: NodeKind, name: &str, position: Option<(usize, usize)>) -> Self {
        let name = name.trim().to_string();
        Self {
            id: 0,
            kind,
            full_name: name.clone(),
            name,
            economy: DEFAULT_ECONOMY,
            guard: DEFAULT_GUARD,
            connections: BTreeSet::new(),
            position,
        }
    }

    pub fn city(name: &str) -> Self {
        Self::new(NodeKind::City, name, None)
    }

    pub fn relay(position: Option<(usize, usize)>) -> Self {
        Self::new(NodeKind::Relay, RELAY_GLYPH, position)
    }

    pub fn is_city(&self) -> bool {
        self.kind == NodeKind::City
    }

    pub fn is_relay(&self) -> bool {
        self.kind == NodeKind::Relay
    }

    /// Text drawn for this node on the map.
    pub fn display_text(&self) -> &str {
        match self.kind {
            NodeKind::City => &self.name,
            NodeKind::Relay => RELAY_GLYPH,
        }
    }

    /// True for a relay whose short name was never changed from the glyph.
    /// Only such relays derive their full name from the cities they bridge.
    pub fn eligible_for_auto_name(&self) -> bool {
        match self.kind {
            NodeKind::City => false,
            NodeKind::Relay => self.name == RELAY_GLYPH,
        }
    }

    /// True for a relay that still exports under the glyph.
    pub fn has_default_full_name(&self) -> bool {
        self.is_relay() && self.full_name == RELAY_GLYPH
    }
}

/// Arena that owns every node of one map snapshot.
///
/// Order is export order: cities first, then relays, each in scan order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MapGraph {
    pub nodes: Vec<Node>,
}

impl MapGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, node: Node) -> NodeIndex {
        self.nodes.push(node);
        NodeIndex(self.nodes.len() - 1)
    }

    pub fn get(&self, idx: NodeIndex) -> Option<&Node> {
        self.nodes.get(idx.0)
    }

    pub fn get_mut(&mut self, idx: NodeIndex) -> Option<&mut Node> {
        self.nodes.get_mut(idx.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeIndex(i), n))
    }

    /// Find a node by its export id.
    pub fn index_of_id(&self, id: u32) -> Option<NodeIndex> {
        self.nodes.iter().position(|n| n.id == id).map(NodeIndex)
    }

    pub fn cities(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_city())
    }

    pub fn relays(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_relay())
    }

    pub fn city_count(&self) -> usize {
        self.cities().count()
    }

    pub fn is_connected(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.get(a).is_some_and(|n| n.connections.contains(&b))
    }

    /// Add the undirected edge `a -- b`.
    ///
    /// Returns `false` for self-loops, unknown indices, or an edge that
    /// already exists.
    pub fn connect(&mut self, a: NodeIndex, b: NodeIndex) -> bool {
        if a == b || a.0 >= self.nodes.len() || b.0 >= self.nodes.len() {
            return false;
        }
        let added = self.nodes[a.0].connections.insert(b);
        self.nodes[b.0].connections.insert(a);
        added
    }

    /// Remove the undirected edge `a -- b`. Returns `true` if it existed.
    pub fn disconnect(&mut self, a: NodeIndex, b: NodeIndex) -> bool {
        if a.0 >= self.nodes.len() || b.0 >= self.nodes.len() {
            return false;
        }
        let removed = self.nodes[a.0].connections.remove(&b);
        self.nodes[b.0].connections.remove(&a);
        removed
    }

    /// Neighbours of `idx`, ascending by export id.
    pub fn neighbors(&self, idx: NodeIndex) -> Vec<&Node> {
        let Some(node) = self.get(idx) else {
            return Vec::new();
        };
        let mut out: Vec<&Node> = node
            .connections
            .iter()
            .filter_map(|&c| self.get(c))
            .collect();
        out.sort_by_key(|n| n.id);
        out
    }

    /// The `"<cityA>-<cityB>"` full name a relay takes when it bridges exactly
    /// two cities, ordered by city id. `None` when the rule does not apply.
    pub fn derived_relay_name(&self, idx: NodeIndex) -> Option<String> {
        let node = self.get(idx)?;
        if !node.eligible_for_auto_name() {
            return None;
        }
        let cities: Vec<&Node> = self
            .neighbors(idx)
            .into_iter()
            .filter(|n| n.is_city())
            .collect();
        match cities.as_slice() {
            [a, b] => Some(format!("{}-{}", a.full_name, b.full_name)),
            _ => None,
        }
    }

    /// Apply [`derived_relay_name`](Self::derived_relay_name) to `idx`.
    /// Returns `true` when the full name changed.
    pub fn refresh_relay_name(&mut self, idx: NodeIndex) -> bool {
        let Some(name) = self.derived_relay_name(idx) else {
            return false;
        };
        let node = &mut self.nodes[idx.0];
        if node.full_name == name {
            return false;
        }
        node.full_name = name;
        true
    }

    /// Every edge appears on both endpoints and points inside the arena.
    #[cfg(test)]
    pub fn is_consistent(&self) -> bool {
        self.iter().all(|(idx, node)| {
            !node.connections.contains(&idx)
                && node
                    .connections
                    .iter()
                    .all(|&c| self.get(c).is_some_and(|m| m.connections.contains(&idx)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(nodes: Vec<Node>) -> MapGraph {
        let mut g = MapGraph::new();
        for (i, mut n) in nodes.into_iter().enumerate() {
            n.id = i as u32 + 1;
            g.push(n);
        }
        g
    }

    #[test]
    fn new_node_defaults() {
        let n = Node::city("  Alpha ");
        assert_eq!(n.name, "Alpha");
        assert_eq!(n.full_name, "Alpha");
        assert_eq!(n.economy, DEFAULT_ECONOMY);
        assert_eq!(n.guard, DEFAULT_GUARD);
        assert!(n.connections.is_empty());

        let r = Node::relay(Some((0, 3)));
        assert_eq!(r.name, RELAY_GLYPH);
        assert_eq!(r.display_text(), RELAY_GLYPH);
        assert!(r.has_default_full_name());
    }

    #[test]
    fn connect_is_symmetric_and_rejects_self_loops() {
        let mut g = graph_with(vec![Node::city("A"), Node::city("B")]);
        assert!(g.connect(NodeIndex(0), NodeIndex(1)));
        assert!(g.is_connected(NodeIndex(1), NodeIndex(0)));
        assert!(!g.connect(NodeIndex(1), NodeIndex(0)), "edge already exists");
        assert!(!g.connect(NodeIndex(0), NodeIndex(0)));
        assert!(!g.connect(NodeIndex(0), NodeIndex(9)));
        assert!(g.is_consistent());
    }

    #[test]
    fn disconnect_removes_both_directions() {
        let mut g = graph_with(vec![Node::city("A"), Node::city("B")]);
        g.connect(NodeIndex(0), NodeIndex(1));
        assert!(g.disconnect(NodeIndex(1), NodeIndex(0)));
        assert!(g.nodes[0].connections.is_empty());
        assert!(g.nodes[1].connections.is_empty());
        assert!(!g.disconnect(NodeIndex(0), NodeIndex(1)));
    }

    #[test]
    fn relay_between_two_cities_derives_name() {
        let mut g = graph_with(vec![Node::city("X"), Node::city("Y"), Node::relay(None)]);
        g.connect(NodeIndex(2), NodeIndex(1));
        assert_eq!(g.derived_relay_name(NodeIndex(2)), None);
        g.connect(NodeIndex(2), NodeIndex(0));
        assert!(g.refresh_relay_name(NodeIndex(2)));
        assert_eq!(g.nodes[2].full_name, "X-Y");
    }

    #[test]
    fn relay_name_uses_city_full_names() {
        let mut a = Node::city("A");
        a.full_name = "Alpha".into();
        let mut b = Node::city("B");
        b.full_name = "Beta".into();
        let mut g = graph_with(vec![a, b, Node::relay(None)]);
        g.connect(NodeIndex(0), NodeIndex(2));
        g.connect(NodeIndex(1), NodeIndex(2));
        assert_eq!(
            g.derived_relay_name(NodeIndex(2)).as_deref(),
            Some("Alpha-Beta")
        );
    }

    #[test]
    fn relay_with_three_cities_or_relay_neighbours_is_not_renamed() {
        let mut g = graph_with(vec![
            Node::city("A"),
            Node::city("B"),
            Node::city("C"),
            Node::relay(None),
            Node::relay(None),
        ]);
        for c in 0..3 {
            g.connect(NodeIndex(c), NodeIndex(3));
        }
        assert_eq!(g.derived_relay_name(NodeIndex(3)), None);

        g.connect(NodeIndex(0), NodeIndex(4));
        g.connect(NodeIndex(3), NodeIndex(4));
        assert_eq!(g.derived_relay_name(NodeIndex(4)), None);
    }

    #[test]
    fn renamed_relay_and_cities_never_auto_name() {
        let mut relay = Node::relay(None);
        relay.name = "Gate".into();
        let mut g = graph_with(vec![Node::city("A"), Node::city("B"), relay, Node::city("C")]);
        g.connect(NodeIndex(0), NodeIndex(2));
        g.connect(NodeIndex(1), NodeIndex(2));
        assert_eq!(g.derived_relay_name(NodeIndex(2)), None);

        g.connect(NodeIndex(3), NodeIndex(0));
        g.connect(NodeIndex(3), NodeIndex(1));
        assert_eq!(g.derived_relay_name(NodeIndex(3)), None);
    }

    #[test]
    fn neighbors_sorted_by_id() {
        let mut g = graph_with(vec![Node::city("A"), Node::city("B"), Node::city("C")]);
        g.nodes[1].id = 7;
        g.connect(NodeIndex(0), NodeIndex(1));
        g.connect(NodeIndex(0), NodeIndex(2));
        let ids: Vec<u32> = g.neighbors(NodeIndex(0)).iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 7]);
    }
}
