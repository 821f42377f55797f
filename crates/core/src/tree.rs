use tracing::debug;

use crate::node::FunctionCallNode;
use crate::options::TreeOptions;

/// Expand `root` into a depth-first, pre-order list of nodes.
///
/// Every node is immediately followed by the contiguous run of its
/// included descendants, so one linear pass over the result can render a
/// correctly nested tree. Children are visited heaviest first (stable on
/// ties) and a child is kept when its cumulative time reaches the current
/// threshold or it was line-profiled. A child with zero cumulative time
/// never passes on time alone. Excluded children are not expanded.
///
/// `cum_threshold` applies to the root's children; callers normally pass
/// [`TreeOptions::root_threshold`] of the root's cumulative time.
pub fn build_tree<'a>(
    root: FunctionCallNode<'a>,
    cum_threshold: f64,
    options: &TreeOptions,
) -> Vec<FunctionCallNode<'a>> {
    let mut nodes: Vec<FunctionCallNode<'a>> = Vec::new();
    // (node, threshold for its children, slot of its parent)
    let mut stack: Vec<(FunctionCallNode<'a>, f64, Option<usize>)> =
        vec![(root, cum_threshold, None)];
    while let Some((mut node, threshold, parent)) = stack.pop() {
        if let Some(parent) = parent {
            nodes[parent].has_subfuncs = true;
        }
        node.has_subfuncs = false;

        let mut children: Vec<_> = if node.depth() >= options.max_depth {
            Vec::new()
        } else {
            node.child_calls()
                .filter(|child| {
                    let cumulative = child.cumulative_time();
                    (cumulative > 0.0 && cumulative >= threshold) || child.has_line_stats()
                })
                .collect()
        };
        children.sort_by(|a, b| b.cumulative_time().total_cmp(&a.cumulative_time()));

        let slot = nodes.len();
        nodes.push(node);
        // Reversed so the heaviest child is popped, and expanded, first.
        for child in children.into_iter().rev() {
            let next = options.child_threshold(child.cumulative_time(), threshold);
            stack.push((child, next, Some(slot)));
        }
    }
    debug!(
        nodes = nodes.len(),
        threshold = cum_threshold,
        max_depth = options.max_depth,
        "built call tree"
    );
    nodes
}
