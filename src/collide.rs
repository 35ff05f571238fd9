use crate::geometry::ScreenRect;

/// What the collision pass needs to know about one rendered note
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct CollisionCandidate {
    pub rect: ScreenRect,
    pub dragging: bool,
    pub focused: bool,
    pub selected: bool,
    pub hovered: bool,
}

/// Which of two overlapping notes gets hidden
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Loser {
    First,
    Second,
}

/// `a` was added before `b`. Dragging beats focused beats selected
/// (beats hovered, if enabled), otherwise the later note stays visible.
pub fn pick_loser(a: &CollisionCandidate, b: &CollisionCandidate, hover_priority: bool) -> Loser {
    let ranks = [
        (a.dragging, b.dragging),
        (a.focused, b.focused),
        (a.selected, b.selected),
        (hover_priority && a.hovered, hover_priority && b.hovered),
    ];
    for (keep_a, keep_b) in ranks {
        if keep_a {
            return Loser::Second;
        }
        if keep_b {
            return Loser::First;
        }
    }
    Loser::First
}

/// Returns one hidden flag per candidate, candidates in insertion order.
///
/// Every overlapping pair hides exactly one of the two. Once a note is
/// hidden it cannot hide later notes anymore, but it still counts as the
/// other side of a comparison.
pub fn resolve_collisions(candidates: &[CollisionCandidate], hover_priority: bool) -> Vec<bool> {
    let mut hidden = vec![false; candidates.len()];

    for a in 0..candidates.len() {
        if hidden[a] {
            continue;
        }
        for b in (a + 1)..candidates.len() {
            if !candidates[a].rect.intersects(&candidates[b].rect) {
                continue;
            }
            match pick_loser(&candidates[a], &candidates[b], hover_priority) {
                Loser::Second => hidden[b] = true,
                Loser::First => {
                    hidden[a] = true;
                    break;
                },
            }
        }
    }

    hidden
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ScreenSize;

    fn at(left: f64, top: f64) -> CollisionCandidate {
        CollisionCandidate {
            rect: ScreenRect::new(left, top, ScreenSize { width: 50.0, height: 20.0 }),
            ..Default::default()
        }
    }

    #[test]
    fn later_note_wins() {
        let hidden = resolve_collisions(&[at(0.0, 0.0), at(10.0, 5.0)], false);
        assert_eq!(hidden, vec![true, false]);
    }

    #[test]
    fn disjoint_notes_stay_visible() {
        let hidden = resolve_collisions(&[at(0.0, 0.0), at(100.0, 0.0), at(0.0, 100.0)], false);
        assert_eq!(hidden, vec![false, false, false]);
    }

    #[test]
    fn touching_edges_overlap() {
        let hidden = resolve_collisions(&[at(0.0, 0.0), at(50.0, 0.0)], false);
        assert_eq!(hidden, vec![true, false]);
    }

    #[test]
    fn priority_order() {
        let a = at(0.0, 0.0);
        let b = at(10.0, 0.0);
        assert_eq!(resolve_collisions(&[CollisionCandidate { selected: true, ..a }, b], false), vec![false, true]);
        assert_eq!(
            resolve_collisions(&[CollisionCandidate { focused: true, ..a }, CollisionCandidate { selected: true, ..b }], false),
            vec![false, true],
        );
        assert_eq!(
            resolve_collisions(&[CollisionCandidate { dragging: true, ..a }, CollisionCandidate { focused: true, ..b }], false),
            vec![false, true],
        );
        assert_eq!(
            resolve_collisions(&[CollisionCandidate { selected: true, ..a }, CollisionCandidate { focused: true, ..b }], false),
            vec![true, false],
        );
    }

    #[test]
    fn hover_priority_is_optional() {
        let notes = [CollisionCandidate { hovered: true, ..at(0.0, 0.0) }, at(10.0, 0.0)];
        assert_eq!(resolve_collisions(&notes, false), vec![true, false]);
        assert_eq!(resolve_collisions(&notes, true), vec![false, true]);
    }

    #[test]
    fn hidden_note_does_not_hide_others() {
        // 0 overlaps 1 and 2, 1 and 2 do not overlap each other
        let notes = [at(40.0, 0.0), at(0.0, 0.0), CollisionCandidate { selected: true, ..at(80.0, 0.0) }];
        assert_eq!(resolve_collisions(&notes, false), vec![true, false, false]);
    }

    #[test]
    fn hidden_note_still_loses_comparisons() {
        let notes = [
            CollisionCandidate { selected: true, ..at(0.0, 0.0) },
            at(10.0, 0.0),
            at(20.0, 0.0),
        ];
        assert_eq!(resolve_collisions(&notes, false), vec![false, true, true]);
    }
}
