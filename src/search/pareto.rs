//! Divide-and-conquer non-dominated filtering over behavioral scores.
//!
//! The filter works on handles into a shared pool of entries so no scores
//! are copied while comparing. Splits fork onto the thread pool while the
//! job budget allows, halving the budget at each level.

use super::score::{Domination, dominates};
use super::store::ScoredProgram;

/// Handle into the shared entry pool.
type Id = usize;

fn split(mut ids: Vec<Id>) -> (Vec<Id>, Vec<Id>) {
    let tail = ids.split_off(ids.len() / 2);
    (ids, tail)
}

fn split_jobs(jobs: usize) -> (usize, usize) {
    let first = jobs / 2;
    (first, (jobs - first).max(1))
}

/// Sorted set intersection over handle vectors.
fn intersect(mut a: Vec<Id>, mut b: Vec<Id>) -> Vec<Id> {
    a.sort_unstable();
    b.sort_unstable();
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let mut bi = b.iter().peekable();
    for id in a {
        while let Some(&&next) = bi.peek() {
            if next < id {
                bi.next();
            } else {
                break;
            }
        }
        if bi.peek() == Some(&&id) {
            out.push(id);
        }
    }
    out
}

/// The subset of `ids` not strictly dominated by another member.
pub(crate) fn nondominated<P: Sync>(
    pool: &[&ScoredProgram<P>],
    ids: Vec<Id>,
    jobs: usize,
) -> Vec<Id> {
    if ids.len() < 2 {
        return ids;
    }
    let (a, b) = split(ids);
    let (a_nd, b_nd) = if jobs > 1 {
        let (jobs_a, jobs_b) = split_jobs(jobs);
        rayon::join(
            || nondominated(pool, a, jobs_a),
            || nondominated(pool, b, jobs_b),
        )
    } else {
        (nondominated(pool, a, 1), nondominated(pool, b, 1))
    };
    let (mut keep_a, keep_b) = nondominated_disjoint(pool, a_nd, b_nd, jobs);
    keep_a.extend(keep_b);
    keep_a
}

/// Mutual filtering of two sets, each already free of internal domination.
/// Returns the survivors of `a` and of `b`.
pub(crate) fn nondominated_disjoint<P: Sync>(
    pool: &[&ScoredProgram<P>],
    a: Vec<Id>,
    b: Vec<Id>,
    jobs: usize,
) -> (Vec<Id>, Vec<Id>) {
    if a.is_empty() || b.is_empty() {
        return (a, b);
    }
    if a.len() == 1 {
        let x = a[0];
        let mut keep_a = true;
        let mut keep_b = Vec::with_capacity(b.len());
        for (i, &y) in b.iter().enumerate() {
            match dominates(&pool[x].bscore, &pool[y].bscore) {
                Domination::Worse => {
                    // x is out; nothing further in b can be dominated by it.
                    keep_a = false;
                    keep_b.extend_from_slice(&b[i..]);
                    break;
                }
                Domination::Incomparable => keep_b.push(y),
                Domination::Better => {}
            }
        }
        return (if keep_a { vec![x] } else { Vec::new() }, keep_b);
    }

    let (a1, a2) = split(a);
    if jobs > 1 {
        let (jobs_a, jobs_b) = split_jobs(jobs);
        let b2 = b.clone();
        let ((mut keep_a1, b_left), (keep_a2, b_right)) = rayon::join(
            || nondominated_disjoint(pool, a1, b, jobs_a),
            || nondominated_disjoint(pool, a2, b2, jobs_b),
        );
        keep_a1.extend(keep_a2);
        (keep_a1, intersect(b_left, b_right))
    } else {
        let (mut keep_a1, b) = nondominated_disjoint(pool, a1, b, 1);
        let (keep_a2, b) = nondominated_disjoint(pool, a2, b, 1);
        keep_a1.extend(keep_a2);
        (keep_a1, b)
    }
}

/// Retain only the entries not strictly dominated by another member.
pub fn remove_dominated<P: Sync>(entries: &mut Vec<ScoredProgram<P>>, jobs: usize) {
    if entries.len() < 2 {
        return;
    }
    let pool: Vec<&ScoredProgram<P>> = entries.iter().collect();
    let ids: Vec<Id> = (0..pool.len()).collect();
    let keep = nondominated(&pool, ids, jobs.max(1));

    let mut mask = vec![false; entries.len()];
    for id in keep {
        mask[id] = true;
    }
    drop(pool);

    let mut i = 0;
    entries.retain(|_| {
        let kept = mask[i];
        i += 1;
        kept
    });
}
