//! Grouping. A group-by emits one aggregate node for the keys and a
//! lazy correlated sub-plan for the member rows; aggregates applied to
//! a group later try to fold into the same aggregate node.

use super::{
    Frame, Projection, Translator, TranslatorState,
    operators::{arg, item_offsets},
};
use crate::{
    error::{ErrorOrigin, TranslateError},
    graph::ExprId,
    mapped::MappedValue,
    plan::{AggregateColumn, ApplyCellId, NodeId, RelNode, ScalarExpr},
};
use std::collections::BTreeMap;

///
/// GroupedPlans
///
/// Side table from a grouping's apply cell to the state needed to fold
/// further aggregates into its aggregate node. Keyed by cell because
/// cells survive root rewrites; node ids do not.
///

#[derive(Debug, Default)]
pub(crate) struct GroupedPlans {
    groups: BTreeMap<ApplyCellId, GroupInfo>,
}

#[derive(Debug)]
pub(crate) struct GroupInfo {
    /// Input node the aggregate reads; folding may advance it when a
    /// selector needs a computed column.
    pub input: NodeId,
    /// Grouping column offsets in input space.
    pub group: Vec<usize>,
    /// Aggregate columns folded in so far.
    pub aggregates: Vec<AggregateColumn>,
    /// Element item in input space, for aggregate selectors.
    pub item: MappedValue,
}

impl GroupedPlans {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, cell: ApplyCellId, info: GroupInfo) {
        self.groups.insert(cell, info);
    }

    pub(crate) fn get_mut(&mut self, cell: ApplyCellId) -> Option<&mut GroupInfo> {
        self.groups.get_mut(&cell)
    }

    pub(crate) fn contains(&self, cell: ApplyCellId) -> bool {
        self.groups.contains_key(&cell)
    }
}

impl Translator<'_> {
    pub(crate) fn op_group_by(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let key_lambda = arg(args, 0)?;
        let element_lambda = args.get(1).copied();

        // Key and element item in input space. Computed columns land
        // before the aggregate node is allocated.
        let mut frame = Frame {
            root: projection.root,
        };
        let key_value = self.selected_value(key_lambda, &projection, &mut frame, state)?;
        let fold_item = match element_lambda {
            Some(lambda) => self.selected_value(lambda, &projection, &mut frame, state)?,
            None => projection.item.clone(),
        };
        let group = item_offsets(&key_value)?;
        if group.is_empty() {
            return Err(TranslateError::unsupported(
                ErrorOrigin::Translate,
                "grouping key has no columns",
            ));
        }

        let input = frame.root;
        let aggregate = self.arena.alloc(RelNode::Aggregate {
            input,
            group: group.clone(),
            aggregates: Vec::new(),
        });
        let cell = self.cells.cell_for(aggregate);

        // The member rows: the source translated afresh, kept to rows
        // whose key equals the group's key, null pairing with null.
        let elements = self.group_elements(source, key_lambda, element_lambda, cell, state)?;

        // The key in aggregate space: group columns lead the output row.
        let width = self.arena.width(input);
        let mut table = vec![None; width];
        for (position, offset) in group.iter().enumerate() {
            table[*offset] = Some(position);
        }
        let key_item = key_value.remap(&table)?;

        self.grouped.register(
            cell,
            GroupInfo {
                input,
                group,
                aggregates: Vec::new(),
                item: fold_item,
            },
        );

        let item = MappedValue::Grouping {
            key: Box::new(key_item),
            elements: Box::new(elements),
            cell,
        };
        Ok(Projection::sequence(aggregate, item))
    }

    fn group_elements(
        &mut self,
        source: ExprId,
        key_lambda: ExprId,
        element_lambda: Option<ExprId>,
        cell: ApplyCellId,
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let fresh = self.translate_node(source, state.nested())?;
        let mut frame = Frame { root: fresh.root };
        let key_value = self.selected_value(key_lambda, &fresh, &mut frame, state)?;
        let item = match element_lambda {
            Some(lambda) => self.selected_value(lambda, &fresh, &mut frame, state)?,
            None => fresh.item.clone(),
        };

        let offsets = item_offsets(&key_value)?;
        let predicate = ScalarExpr::and_all(
            offsets
                .iter()
                .enumerate()
                .map(|(position, offset)| {
                    let member = ScalarExpr::Column(*offset);
                    let outer = ScalarExpr::Outer {
                        cell,
                        column: position,
                    };
                    // Null keys group together, so pair null with null.
                    ScalarExpr::or(
                        ScalarExpr::eq(member.clone(), outer.clone()),
                        ScalarExpr::and(ScalarExpr::is_null(member), ScalarExpr::is_null(outer)),
                    )
                })
                .collect(),
        );
        let filter = self.arena.alloc(RelNode::Filter {
            input: frame.root,
            predicate,
        });
        Ok(Projection::sequence(filter, item))
    }

    /// Apply a one-parameter selector lambda over an element, fixing the
    /// result into the frame's row space.
    pub(crate) fn selected_value(
        &mut self,
        lambda: ExprId,
        element: &Projection,
        frame: &mut Frame,
        state: TranslatorState,
    ) -> Result<MappedValue, TranslateError> {
        let (params, body) = self.lambda_parts(lambda, 1)?;
        let bound = element.clone().with_root(frame.root);
        self.with_binding(params[0], bound, |this| {
            let spaced = this.visit_value(body, frame, state.nested())?;
            this.into_current(spaced, frame)
        })
    }
}
