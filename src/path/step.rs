//! Path Steps
//!
//! The fragment of location paths the streaming matcher supports:
//! forward axes only, a single node test per step, and at most one
//! positional predicate.

use std::fmt;

use crate::buffer::BufferNode;
use crate::tags::TagId;

/// Forward axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
}

impl Axis {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "child" => Some(Axis::Child),
            "descendant" => Some(Axis::Descendant),
            "descendant-or-self" => Some(Axis::DescendantOrSelf),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
        }
    }
}

/// Node test in a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTest {
    /// Elements with this tag
    Name(TagId),
    /// `*` - any element (the virtual root is not an element)
    AnyTag,
    /// `node()` - any node, root included
    AnyNode,
    /// `text()`
    Text,
}

impl NodeTest {
    pub fn matches(self, node: &BufferNode) -> bool {
        match self {
            NodeTest::Name(tag) => node.tag_id() == Some(tag),
            NodeTest::AnyTag => node.is_tag() && !node.is_root(),
            NodeTest::AnyNode => true,
            NodeTest::Text => node.is_text(),
        }
    }
}

/// One location step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathStep {
    pub axis: Axis,
    pub test: NodeTest,
    /// 1-based `[position()=k]`
    pub position: Option<u32>,
}

impl PathStep {
    pub fn new(axis: Axis, test: NodeTest) -> Self {
        PathStep {
            axis,
            test,
            position: None,
        }
    }

    pub fn child(test: NodeTest) -> Self {
        Self::new(Axis::Child, test)
    }

    pub fn descendant(test: NodeTest) -> Self {
        Self::new(Axis::Descendant, test)
    }

    pub fn descendant_or_self(test: NodeTest) -> Self {
        Self::new(Axis::DescendantOrSelf, test)
    }

    pub fn at(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::", self.axis.as_str())?;
        match self.test {
            NodeTest::Name(tag) => write!(f, "{tag}")?,
            NodeTest::AnyTag => f.write_str("*")?,
            NodeTest::AnyNode => f.write_str("node()")?,
            NodeTest::Text => f.write_str("text()")?,
        }
        if let Some(k) = self.position {
            write!(f, "[{k}]")?;
        }
        Ok(())
    }
}

/// Relative location path; empty means "the base node itself"
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathExpr {
    steps: Vec<PathStep>,
}

impl PathExpr {
    pub fn new(steps: Vec<PathStep>) -> Self {
        PathExpr { steps }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// True when no node can ever match from a non-text base: a `text()`
    /// step followed by anything but a descendant-or-self step.
    pub fn is_unsatisfiable(&self) -> bool {
        self.steps
            .windows(2)
            .any(|w| w[0].test == NodeTest::Text && w[1].axis != Axis::DescendantOrSelf)
    }

    /// True when no node can match from a text-node base
    pub fn is_unsatisfiable_from_text(&self) -> bool {
        self.steps.iter().any(|s| s.axis != Axis::DescendantOrSelf)
    }
}

impl FromIterator<PathStep> for PathExpr {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        PathExpr::new(iter.into_iter().collect())
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str(".");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let path: PathExpr = [
            PathStep::child(NodeTest::Name(TagId(1))),
            PathStep::descendant(NodeTest::AnyTag).at(2),
            PathStep::descendant_or_self(NodeTest::Text),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            path.to_string(),
            "child::tag#1/descendant::*[2]/descendant-or-self::text()"
        );
        assert_eq!(PathExpr::empty().to_string(), ".");
    }

    #[test]
    fn test_static_unsatisfiability() {
        let text_then_child = PathExpr::new(vec![
            PathStep::descendant(NodeTest::Text),
            PathStep::child(NodeTest::AnyNode),
        ]);
        assert!(text_then_child.is_unsatisfiable());

        let text_then_dos = PathExpr::new(vec![
            PathStep::descendant(NodeTest::Text),
            PathStep::descendant_or_self(NodeTest::AnyNode),
        ]);
        assert!(!text_then_dos.is_unsatisfiable());
        assert!(text_then_dos.is_unsatisfiable_from_text());

        let only_dos = PathExpr::new(vec![PathStep::descendant_or_self(NodeTest::Text)]);
        assert!(!only_dos.is_unsatisfiable_from_text());
    }

    #[test]
    fn test_node_tests() {
        let root = BufferNode::tag(TagId::ROOT, None);
        let elem = BufferNode::tag(TagId(3), None);
        let text = BufferNode::text("x".into(), None);

        assert!(!NodeTest::AnyTag.matches(&root));
        assert!(NodeTest::AnyNode.matches(&root));
        assert!(NodeTest::AnyTag.matches(&elem));
        assert!(NodeTest::Name(TagId(3)).matches(&elem));
        assert!(!NodeTest::Name(TagId(4)).matches(&elem));
        assert!(NodeTest::Text.matches(&text));
        assert!(!NodeTest::Text.matches(&elem));
    }
}
