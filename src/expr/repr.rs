//! Knob decoration of an exemplar expression.
//!
//! Two knob kinds are attached while walking the exemplar: numeric
//! literals become constant knobs (shifted in fixed steps around their
//! base value) and variable leaves become rotation knobs over the
//! non-ignored inputs. The all-zero instance reproduces the exemplar.

use crate::schema::OperatorSet;
use crate::search::{Instance, KnobSpec, Representation, argument};

use super::Expr;

/// Shift applied per unit setting of a constant knob.
const CONSTANT_STEP: f64 = 0.25;

/// Half-width of a constant knob's setting range.
const CONSTANT_SPAN: i16 = 8;

#[derive(Debug, Clone)]
enum Knob {
    /// Shift a numeric literal away from its base value.
    Constant { path: Vec<usize>, base: f64 },
    /// Rotate a variable leaf through the admissible inputs.
    Variable {
        path: Vec<usize>,
        base: usize,
        choices: Vec<usize>,
    },
}

/// Representation mapping knob settings onto expression variants.
#[derive(Debug, Clone)]
pub struct ExprRepr {
    exemplar: Expr,
    knobs: Vec<Knob>,
    fields: Vec<KnobSpec>,
}

impl ExprRepr {
    pub(crate) fn build(
        exemplar: &Expr,
        arity: usize,
        ignore_ops: &OperatorSet,
    ) -> Option<Self> {
        let allowed: Vec<usize> = (0..arity)
            .filter(|i| !ignore_ops.contains(&argument(i + 1)))
            .collect();

        let mut knobs = Vec::new();
        collect_knobs(exemplar, &mut Vec::new(), &allowed, &mut knobs);
        if knobs.is_empty() {
            return None;
        }

        let fields = knobs
            .iter()
            .map(|knob| match knob {
                Knob::Constant { .. } => KnobSpec {
                    min: -CONSTANT_SPAN,
                    max: CONSTANT_SPAN,
                },
                Knob::Variable { choices, .. } => KnobSpec {
                    min: 0,
                    max: (choices.len() - 1) as i16,
                },
            })
            .collect();

        Some(Self {
            exemplar: exemplar.clone(),
            knobs,
            fields,
        })
    }
}

fn collect_knobs(
    expr: &Expr,
    path: &mut Vec<usize>,
    allowed: &[usize],
    out: &mut Vec<Knob>,
) {
    match expr {
        Expr::Num(v) => out.push(Knob::Constant {
            path: path.clone(),
            base: *v,
        }),
        Expr::Var(i) => {
            // A rotation knob is useful only if it can reach a different
            // input than the exemplar's.
            if allowed.iter().any(|&c| c != *i) {
                out.push(Knob::Variable {
                    path: path.clone(),
                    base: *i,
                    choices: allowed.to_vec(),
                });
            }
        }
        Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) => {
            path.push(0);
            collect_knobs(a, path, allowed, out);
            path.pop();
            path.push(1);
            collect_knobs(b, path, allowed, out);
            path.pop();
        }
        Expr::Neg(a) => {
            path.push(0);
            collect_knobs(a, path, allowed, out);
            path.pop();
        }
    }
}

fn node_at<'a>(tree: &'a mut Expr, path: &[usize]) -> Option<&'a mut Expr> {
    let mut node = tree;
    for step in path {
        node = match node {
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) => {
                if *step == 0 { a } else { b }
            }
            Expr::Neg(a) => a,
            _ => return None,
        };
    }
    Some(node)
}

fn apply_knob(tree: &mut Expr, knob: &Knob, setting: i16) {
    match knob {
        Knob::Constant { path, base } => {
            if let Some(node) = node_at(tree, path) {
                *node = Expr::Num(base + CONSTANT_STEP * setting as f64);
            }
        }
        Knob::Variable {
            path,
            base,
            choices,
        } => {
            let origin =
                choices.iter().position(|c| c == base).unwrap_or(0);
            let index = (origin + setting.max(0) as usize) % choices.len();
            if let Some(node) = node_at(tree, path) {
                *node = Expr::Var(choices[index]);
            }
        }
    }
}

impl Representation for ExprRepr {
    type Program = Expr;

    fn fields(&self) -> &[KnobSpec] {
        &self.fields
    }

    fn candidate(&self, instance: &Instance, reduce: bool) -> Expr {
        let mut tree = self.exemplar.clone();
        for (knob, setting) in self.knobs.iter().zip(instance) {
            if *setting != 0 {
                apply_knob(&mut tree, knob, *setting);
            }
        }
        if reduce { tree.reduce() } else { tree }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(a: Expr, b: Expr) -> Expr {
        Expr::Add(Box::new(a), Box::new(b))
    }

    #[test]
    fn test_neutral_instance_reproduces_exemplar() {
        let exemplar = add(Expr::Var(0), Expr::Num(1.0));
        let repr =
            ExprRepr::build(&exemplar, 2, &OperatorSet::new()).unwrap();

        let neutral: Instance = vec![0; repr.knob_count()];
        assert_eq!(repr.candidate(&neutral, false), exemplar);
    }

    #[test]
    fn test_constant_knob_shifts_literal() {
        let exemplar = Expr::Num(1.0);
        let repr =
            ExprRepr::build(&exemplar, 1, &OperatorSet::new()).unwrap();
        assert_eq!(repr.knob_count(), 1);

        let shifted = repr.candidate(&vec![4], false);
        assert_eq!(shifted, Expr::Num(2.0));
    }

    #[test]
    fn test_variable_knob_rotates_inputs() {
        let exemplar = Expr::Var(0);
        let repr =
            ExprRepr::build(&exemplar, 3, &OperatorSet::new()).unwrap();

        let rotated = repr.candidate(&vec![1], false);
        assert_eq!(rotated, Expr::Var(1));
        let rotated = repr.candidate(&vec![2], false);
        assert_eq!(rotated, Expr::Var(2));
    }

    #[test]
    fn test_ignored_arguments_limit_choices() {
        let mut ignore = OperatorSet::new();
        ignore.insert(argument(2));

        let exemplar = Expr::Var(0);
        let repr = ExprRepr::build(&exemplar, 3, &ignore).unwrap();

        // Only $1 and $3 remain admissible.
        let rotated = repr.candidate(&vec![1], false);
        assert_eq!(rotated, Expr::Var(2));
    }

    #[test]
    fn test_empty_representation() {
        // A lone variable with every argument ignored has no knobs.
        let mut ignore = OperatorSet::new();
        ignore.insert(argument(1));

        let exemplar = Expr::Var(0);
        assert!(ExprRepr::build(&exemplar, 1, &ignore).is_none());

        // A lone variable in a single-input space cannot rotate either.
        assert!(
            ExprRepr::build(&exemplar, 1, &OperatorSet::new()).is_none()
        );
    }

    #[test]
    fn test_candidate_reduction() {
        let exemplar = add(Expr::Var(0), Expr::Num(1.0));
        let repr =
            ExprRepr::build(&exemplar, 1, &OperatorSet::new()).unwrap();

        // Shift the literal to zero; reduction collapses the addition.
        let reduced = repr.candidate(&vec![-4], true);
        assert_eq!(reduced, Expr::Var(0));
    }
}
