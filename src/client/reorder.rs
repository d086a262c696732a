//! Drag-end handling: turns a drop event into a card move and applies it to
//! the local card list.
//!
//! The card is located by uuid in its lane's position-ordered list; the
//! event's source index is only used to detect a drop back onto its origin.

use crate::board::models::Card;
use crate::board::ordering;

/// A slot inside a lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropLocation {
    pub lane_uuid: String,
    pub index: usize,
}

impl DropLocation {
    pub fn new(lane_uuid: impl Into<String>, index: usize) -> Self {
        Self {
            lane_uuid: lane_uuid.into(),
            index,
        }
    }
}

/// The result of a drag gesture. `destination` is `None` when the card was
/// dropped outside any lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragEnd {
    pub card_uuid: String,
    pub source: DropLocation,
    pub destination: Option<DropLocation>,
}

/// A move to perform: card `card_uuid` goes from `from_lane` to `to_lane` at `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub card_uuid: String,
    pub from_lane: String,
    pub to_lane: String,
    pub index: usize,
}

impl MovePlan {
    pub fn is_cross_lane(&self) -> bool {
        self.from_lane != self.to_lane
    }
}

/// Decide what a drag-end event means for `cards`.
///
/// Returns `None` for a drop outside any lane, a drop back onto the source
/// slot, or an unknown card.
pub fn plan_drag(event: &DragEnd, cards: &[Card]) -> Option<MovePlan> {
    let destination = event.destination.as_ref()?;
    if *destination == event.source {
        return None;
    }
    let card = cards.iter().find(|c| c.uuid == event.card_uuid)?;
    Some(MovePlan {
        card_uuid: card.uuid.clone(),
        from_lane: card.lane_uuid.clone(),
        to_lane: destination.lane_uuid.clone(),
        index: destination.index,
    })
}

/// Cards of `lane_uuid`, ordered by position.
pub fn lane_cards(cards: &[Card], lane_uuid: &str) -> Vec<Card> {
    let mut lane: Vec<Card> = cards
        .iter()
        .filter(|c| c.lane_uuid == lane_uuid)
        .cloned()
        .collect();
    ordering::sort_by_rank(&mut lane);
    lane
}

/// Apply `plan` to `cards`, renumbering the affected lanes to `0..n-1`.
///
/// Returns the index the card landed at (the requested index clamped to the
/// destination lane), or `None` when the card is not in its recorded lane.
pub fn apply_move(cards: &mut Vec<Card>, plan: &MovePlan) -> Option<usize> {
    let mut source = lane_cards(cards, &plan.from_lane);
    let from = source.iter().position(|c| c.uuid == plan.card_uuid)?;

    let (landed, touched) = if plan.is_cross_lane() {
        let mut dest = lane_cards(cards, &plan.to_lane);
        let landed = ordering::transfer(&mut source, from, &mut dest, plan.index)?;
        dest[landed].lane_uuid = plan.to_lane.clone();
        ordering::renumber(&mut source);
        ordering::renumber(&mut dest);
        source.extend(dest);
        (landed, source)
    } else {
        let landed = ordering::reorder(&mut source, from, plan.index)?;
        ordering::renumber(&mut source);
        (landed, source)
    };

    cards.retain(|c| c.lane_uuid != plan.from_lane && c.lane_uuid != plan.to_lane);
    cards.extend(touched);
    Some(landed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::models::Priority;

    fn card(uuid: &str, lane: &str, position: i64) -> Card {
        Card {
            uuid: uuid.into(),
            lane_uuid: lane.into(),
            title: uuid.to_uppercase(),
            description: String::new(),
            priority: Priority::Medium,
            position,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn layout(cards: &[Card], lane: &str) -> Vec<(String, i64)> {
        lane_cards(cards, lane)
            .into_iter()
            .map(|c| (c.uuid, c.position))
            .collect()
    }

    fn drag(card: &str, from: (&str, usize), to: Option<(&str, usize)>) -> DragEnd {
        DragEnd {
            card_uuid: card.into(),
            source: DropLocation::new(from.0, from.1),
            destination: to.map(|(lane, index)| DropLocation::new(lane, index)),
        }
    }

    fn board() -> Vec<Card> {
        vec![
            card("a", "todo", 0),
            card("b", "todo", 1),
            card("x", "doing", 0),
            card("y", "doing", 1),
        ]
    }

    #[test]
    fn test_drop_outside_is_noop() {
        assert_eq!(plan_drag(&drag("a", ("todo", 0), None), &board()), None);
    }

    #[test]
    fn test_drop_on_origin_is_noop() {
        assert_eq!(
            plan_drag(&drag("a", ("todo", 0), Some(("todo", 0))), &board()),
            None
        );
    }

    #[test]
    fn test_unknown_card_is_noop() {
        assert_eq!(
            plan_drag(&drag("zzz", ("todo", 0), Some(("doing", 0))), &board()),
            None
        );
    }

    #[test]
    fn test_cross_lane_move_renumbers_both_lanes() {
        let mut cards = board();
        let plan = plan_drag(&drag("b", ("todo", 1), Some(("doing", 0))), &cards).unwrap();
        assert!(plan.is_cross_lane());
        assert_eq!(apply_move(&mut cards, &plan), Some(0));

        assert_eq!(layout(&cards, "todo"), vec![("a".to_string(), 0)]);
        assert_eq!(
            layout(&cards, "doing"),
            vec![
                ("b".to_string(), 0),
                ("x".to_string(), 1),
                ("y".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_same_lane_reorder_is_dense() {
        let mut cards = vec![
            card("a", "todo", 0),
            card("b", "todo", 1),
            card("c", "todo", 2),
        ];
        let plan = plan_drag(&drag("a", ("todo", 0), Some(("todo", 2))), &cards).unwrap();
        assert!(!plan.is_cross_lane());
        apply_move(&mut cards, &plan);
        assert_eq!(
            layout(&cards, "todo"),
            vec![
                ("b".to_string(), 0),
                ("c".to_string(), 1),
                ("a".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_destination_index_is_clamped() {
        let mut cards = board();
        let plan = plan_drag(&drag("a", ("todo", 0), Some(("doing", 42))), &cards).unwrap();
        assert_eq!(apply_move(&mut cards, &plan), Some(2));
        assert_eq!(
            layout(&cards, "doing"),
            vec![
                ("x".to_string(), 0),
                ("y".to_string(), 1),
                ("a".to_string(), 2)
            ]
        );
        assert_eq!(layout(&cards, "todo"), vec![("b".to_string(), 0)]);
    }

    #[test]
    fn test_stale_source_index_still_finds_card_by_uuid() {
        let mut cards = board();
        // The event claims index 5, but "b" sits at 1.
        let plan = plan_drag(&drag("b", ("todo", 5), Some(("todo", 0))), &cards).unwrap();
        apply_move(&mut cards, &plan);
        assert_eq!(
            layout(&cards, "todo"),
            vec![("b".to_string(), 0), ("a".to_string(), 1)]
        );
    }

    #[test]
    fn test_other_lanes_are_untouched() {
        let mut cards = board();
        cards.push(card("z", "done", 3));
        let plan = plan_drag(&drag("a", ("todo", 0), Some(("todo", 1))), &cards).unwrap();
        apply_move(&mut cards, &plan);
        assert_eq!(layout(&cards, "done"), vec![("z".to_string(), 3)]);
    }
}
