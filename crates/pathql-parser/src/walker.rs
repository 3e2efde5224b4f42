//! Enter/exit traversal of the syntax tree.

use crate::syntax::SyntaxNode;

/// Receives production events during a [`walk`].
///
/// `enter` fires before a node's children are visited and `exit` after.
pub trait Listener<'src> {
    /// Called when a production is entered.
    fn enter(&mut self, node: &SyntaxNode<'src>) {
        let _ = node;
    }

    /// Called when a production is exited.
    fn exit(&mut self, node: &SyntaxNode<'src>) {
        let _ = node;
    }
}

/// Walk `node` depth-first, reporting every production to `listener`.
pub fn walk<'src, L>(node: &SyntaxNode<'src>, listener: &mut L)
where
    L: Listener<'src> + ?Sized,
{
    listener.enter(node);
    for child in node.nodes() {
        walk(child, listener);
    }
    listener.exit(node);
}

/// One production event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseEvent<'a, 'src> {
    /// The production was entered.
    Enter(&'a SyntaxNode<'src>),
    /// The production was exited.
    Exit(&'a SyntaxNode<'src>),
}

impl<'a, 'src> ParseEvent<'a, 'src> {
    /// The node the event refers to.
    pub const fn node(&self) -> &'a SyntaxNode<'src> {
        match self {
            Self::Enter(node) | Self::Exit(node) => node,
        }
    }
}

impl<'src> SyntaxNode<'src> {
    /// The ordered event sequence a [`walk`] over this node produces.
    pub fn events(&self) -> Vec<ParseEvent<'_, 'src>> {
        fn collect<'a, 'src>(node: &'a SyntaxNode<'src>, out: &mut Vec<ParseEvent<'a, 'src>>) {
            out.push(ParseEvent::Enter(node));
            for child in node.nodes() {
                collect(child, out);
            }
            out.push(ParseEvent::Exit(node));
        }

        let mut events = Vec::new();
        collect(self, &mut events);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_expression, Production};

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
    }

    impl<'src> Listener<'src> for Recorder {
        fn enter(&mut self, node: &SyntaxNode<'src>) {
            self.log.push(format!("+{}", node.production));
        }

        fn exit(&mut self, node: &SyntaxNode<'src>) {
            self.log.push(format!("-{}", node.production));
        }
    }

    #[test]
    fn test_walk_matches_events() {
        let tree = parse_expression("!x").unwrap();
        let mut recorder = Recorder::default();
        walk(&tree, &mut recorder);

        let from_events: Vec<String> = tree
            .events()
            .iter()
            .map(|event| match event {
                ParseEvent::Enter(node) => format!("+{}", node.production),
                ParseEvent::Exit(node) => format!("-{}", node.production),
            })
            .collect();
        assert_eq!(recorder.log, from_events);
    }

    #[test]
    fn test_events_are_balanced() {
        let tree = parse_expression("a.b == 1 && (c || d)").unwrap();
        let mut depth = 0i32;
        for event in tree.events() {
            match event {
                ParseEvent::Enter(_) => depth += 1,
                ParseEvent::Exit(_) => depth -= 1,
            }
            assert!(depth >= 0);
        }
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_enter_before_children_exit_after() {
        let tree = parse_expression("x").unwrap();
        let events = tree.events();
        assert!(matches!(events.first(), Some(ParseEvent::Enter(n)) if n.production == Production::Expression));
        assert!(matches!(events.last(), Some(ParseEvent::Exit(n)) if n.production == Production::Expression));
        let variable = events
            .iter()
            .position(|e| matches!(e, ParseEvent::Enter(n) if n.production == Production::Variable))
            .unwrap();
        assert!(matches!(events[variable + 1], ParseEvent::Exit(n) if n.production == Production::Variable));
    }
}
