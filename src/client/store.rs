//! Client-side board state.
//!
//! `BoardStore` is the application-state object a UI would hold: the current
//! board, its lanes and cards, a loading flag and the last error message.
//! Every operation clears `error` on entry and, on failure, records
//! `"Failed to <action>: <message>"` before handing the error back.
//!
//! Card moves are optimistic. The local state changes first and the move is
//! logged as [`MutationState::Pending`]; the API call then either commits it
//! or, on failure, all cards are refetched and it is marked
//! [`MutationState::RolledBack`].

use tracing::{debug, info, warn};

use super::api::BoardApi;
use super::reorder::{self, DragEnd, MovePlan};
use crate::board::db::{DEFAULT_BOARD_DESCRIPTION, DEFAULT_BOARD_NAME, DEFAULT_LANES};
use crate::board::models::{
    Board, Card, CardPatch, Lane, LanePatch, MoveCard, NewBoard, NewCard, NewLane,
};
use crate::board::ordering;
use crate::errors::ClientError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardState {
    pub board: Option<Board>,
    pub lanes: Vec<Lane>,
    pub cards: Vec<Card>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Pending,
    Committed,
    RolledBack,
}

/// One optimistic card move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub id: u64,
    pub plan: MovePlan,
    pub state: MutationState,
}

pub struct BoardStore<A: BoardApi> {
    api: A,
    state: BoardState,
    mutations: Vec<Mutation>,
    next_mutation: u64,
}

fn describe(err: &ClientError) -> String {
    match err {
        ClientError::Api { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn lane_missing() -> ClientError {
    ClientError::Missing("Lane not found".to_string())
}

impl<A: BoardApi> BoardStore<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: BoardState::default(),
            mutations: Vec::new(),
            next_mutation: 1,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Cards of one lane in position order.
    pub fn lane_cards(&self, lane_uuid: &str) -> Vec<Card> {
        reorder::lane_cards(&self.state.cards, lane_uuid)
    }

    fn begin(&mut self) {
        self.state.loading = true;
        self.state.error = None;
    }

    fn finish<T>(&mut self, action: &str, result: Result<T, ClientError>) -> Result<T, ClientError> {
        self.state.loading = false;
        result.inspect_err(|e| {
            warn!(action, error = %e, "Board operation failed");
            self.state.error = Some(format!("Failed to {}: {}", action, describe(e)));
        })
    }

    fn sort_lanes(&mut self) {
        ordering::sort_by_rank(&mut self.state.lanes);
    }

    // ── Loading ───────────────────────────────────────────────────────

    /// Select the newest board, creating the default board with its three
    /// lanes when none exists.
    pub async fn load_board(&mut self) -> Result<Board, ClientError> {
        self.begin();
        let result = self.try_load_board().await;
        self.finish("load board", result)
    }

    async fn try_load_board(&mut self) -> Result<Board, ClientError> {
        let boards = self.api.list_boards().await?;
        let board = match boards.into_iter().next() {
            Some(board) => board,
            None => {
                info!("No board found, creating the default board");
                let board = self
                    .api
                    .create_board(&NewBoard {
                        name: DEFAULT_BOARD_NAME.to_string(),
                        description: DEFAULT_BOARD_DESCRIPTION.to_string(),
                    })
                    .await?;
                for (position, name) in DEFAULT_LANES.iter().enumerate() {
                    self.api
                        .create_lane(
                            &board.uuid,
                            &NewLane {
                                name: name.to_string(),
                                position: Some(position as i64),
                            },
                        )
                        .await?;
                }
                board
            }
        };
        self.state.board = Some(board.clone());
        Ok(board)
    }

    /// Load the board, its lanes and every lane's cards.
    pub async fn load_all(&mut self) -> Result<(), ClientError> {
        let board = self.load_board().await?;
        self.fetch_lanes(&board.uuid).await?;
        self.refresh_cards().await
    }

    /// Load a specific board with its lanes and cards.
    pub async fn open_board(&mut self, uuid: &str) -> Result<Board, ClientError> {
        self.begin();
        let result = self.api.get_board(uuid).await;
        let board = self.finish("load board", result)?;
        self.state.board = Some(board.clone());
        self.fetch_lanes(&board.uuid).await?;
        self.refresh_cards().await?;
        Ok(board)
    }

    pub async fn fetch_lanes(&mut self, board_uuid: &str) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.list_lanes(board_uuid).await;
        let result = result.map(|lanes| {
            self.state.lanes = lanes;
            self.sort_lanes();
        });
        self.finish("load lanes", result)
    }

    /// Replace the cards of one lane with the server's copy.
    pub async fn fetch_cards(&mut self, lane_uuid: &str) -> Result<(), ClientError> {
        self.begin();
        let result = self.reload_lane_cards(lane_uuid).await;
        self.finish("load cards", result)
    }

    /// Refetch the cards of every lane on the board.
    pub async fn refresh_cards(&mut self) -> Result<(), ClientError> {
        self.begin();
        let result = self.reload_all_cards().await;
        self.finish("load cards", result)
    }

    async fn reload_lane_cards(&mut self, lane_uuid: &str) -> Result<(), ClientError> {
        let fetched = self.api.list_cards(lane_uuid).await?;
        self.state.cards.retain(|c| c.lane_uuid != lane_uuid);
        self.state.cards.extend(fetched);
        Ok(())
    }

    /// Rebuilds the card list from every lane. Lanes that fail to load end up
    /// empty and the first failure is returned.
    async fn reload_all_cards(&mut self) -> Result<(), ClientError> {
        let lanes: Vec<String> = self.state.lanes.iter().map(|l| l.uuid.clone()).collect();
        let mut cards = Vec::new();
        let mut first_error = None;
        for lane in lanes {
            match self.api.list_cards(&lane).await {
                Ok(fetched) => cards.extend(fetched),
                Err(e) => {
                    warn!(lane = %lane, error = %e, "Failed to load lane cards");
                    first_error.get_or_insert(e);
                }
            }
        }
        self.state.cards = cards;
        first_error.map_or(Ok(()), Err)
    }

    // ── Cards ─────────────────────────────────────────────────────────

    /// Create a card at the end of `lane_uuid`.
    pub async fn create_card(&mut self, lane_uuid: &str, new: NewCard) -> Result<Card, ClientError> {
        self.begin();
        let result = self.try_create_card(lane_uuid, new).await;
        self.finish("create card", result)
    }

    async fn try_create_card(&mut self, lane_uuid: &str, mut new: NewCard) -> Result<Card, ClientError> {
        if !self.state.lanes.iter().any(|l| l.uuid == lane_uuid) {
            return Err(lane_missing());
        }
        let count = self.state.cards.iter().filter(|c| c.lane_uuid == lane_uuid).count();
        new.position = Some(count as i64);
        let card = self.api.create_card(lane_uuid, &new).await?;
        self.state.cards.push(card.clone());
        Ok(card)
    }

    pub async fn update_card(&mut self, uuid: &str, patch: CardPatch) -> Result<Card, ClientError> {
        self.begin();
        let result = self.try_update_card(uuid, &patch).await;
        self.finish("update card", result)
    }

    async fn try_update_card(&mut self, uuid: &str, patch: &CardPatch) -> Result<Card, ClientError> {
        let updated = self.api.update_card(uuid, patch).await?;
        if patch.relocates() {
            // Other cards in both lanes were renumbered server-side.
            let lanes: Vec<String> = self
                .state
                .cards
                .iter()
                .filter(|c| c.uuid == uuid)
                .map(|c| c.lane_uuid.clone())
                .chain(std::iter::once(updated.lane_uuid.clone()))
                .collect();
            for lane in lanes {
                self.reload_lane_cards(&lane).await?;
            }
        } else if let Some(card) = self.state.cards.iter_mut().find(|c| c.uuid == uuid) {
            *card = updated.clone();
        }
        Ok(updated)
    }

    pub async fn delete_card(&mut self, uuid: &str) -> Result<(), ClientError> {
        self.begin();
        let result = self.try_delete_card(uuid).await;
        self.finish("delete card", result)
    }

    async fn try_delete_card(&mut self, uuid: &str) -> Result<(), ClientError> {
        self.api.delete_card(uuid).await?;
        let lane = self
            .state
            .cards
            .iter()
            .find(|c| c.uuid == uuid)
            .map(|c| c.lane_uuid.clone());
        self.state.cards.retain(|c| c.uuid != uuid);
        if let Some(lane) = lane {
            let mut remaining = reorder::lane_cards(&self.state.cards, &lane);
            ordering::renumber(&mut remaining);
            self.state.cards.retain(|c| c.lane_uuid != lane);
            self.state.cards.extend(remaining);
        }
        Ok(())
    }

    /// Move a card to `position` in `target_lane_uuid`.
    ///
    /// Unknown cards or lanes are ignored. Returns the plan that was applied.
    pub async fn move_card(
        &mut self,
        card_uuid: &str,
        target_lane_uuid: &str,
        position: usize,
    ) -> Result<Option<MovePlan>, ClientError> {
        self.state.error = None;
        let Some(card) = self.state.cards.iter().find(|c| c.uuid == card_uuid) else {
            return Ok(None);
        };
        if !self.state.lanes.iter().any(|l| l.uuid == target_lane_uuid) {
            return Ok(None);
        }
        let plan = MovePlan {
            card_uuid: card.uuid.clone(),
            from_lane: card.lane_uuid.clone(),
            to_lane: target_lane_uuid.to_string(),
            index: position,
        };
        self.execute_move(plan).await.map(Some)
    }

    /// React to the end of a drag gesture.
    ///
    /// Drops outside a lane, drops back onto the source slot and events naming
    /// unknown cards or lanes do nothing and return `Ok(None)`.
    pub async fn handle_drag_end(&mut self, event: &DragEnd) -> Result<Option<MovePlan>, ClientError> {
        let Some(plan) = reorder::plan_drag(event, &self.state.cards) else {
            debug!(card = %event.card_uuid, "Drag ended without a move");
            return Ok(None);
        };
        let known = |uuid: &str| self.state.lanes.iter().any(|l| l.uuid == uuid);
        if !known(&plan.from_lane) || !known(&plan.to_lane) {
            return Ok(None);
        }
        self.state.error = None;
        self.execute_move(plan).await.map(Some)
    }

    async fn execute_move(&mut self, mut plan: MovePlan) -> Result<MovePlan, ClientError> {
        let Some(landed) = reorder::apply_move(&mut self.state.cards, &plan) else {
            return Ok(plan);
        };
        plan.index = landed;

        let id = self.next_mutation;
        self.next_mutation += 1;
        self.mutations.push(Mutation {
            id,
            plan: plan.clone(),
            state: MutationState::Pending,
        });

        let request = MoveCard {
            lane_uuid: plan.to_lane.clone(),
            position: landed as i64,
        };
        match self.api.move_card(&plan.card_uuid, &request).await {
            Ok(card) => {
                if let Some(local) = self.state.cards.iter_mut().find(|c| c.uuid == card.uuid) {
                    *local = card;
                }
                self.set_mutation_state(id, MutationState::Committed);
                Ok(plan)
            }
            Err(e) => {
                self.state.error = Some(format!("Failed to move card: {}", describe(&e)));
                warn!(card = %plan.card_uuid, error = %e, "Move failed, refetching cards");
                if self.state.board.is_some() {
                    if let Err(refetch) = self.reload_all_cards().await {
                        warn!(error = %refetch, "Refetch after failed move also failed");
                    }
                }
                self.set_mutation_state(id, MutationState::RolledBack);
                Err(e)
            }
        }
    }

    fn set_mutation_state(&mut self, id: u64, state: MutationState) {
        if let Some(mutation) = self.mutations.iter_mut().find(|m| m.id == id) {
            mutation.state = state;
        }
    }

    // ── Lanes ─────────────────────────────────────────────────────────

    pub async fn create_lane(&mut self, board_uuid: &str, new: NewLane) -> Result<Lane, ClientError> {
        self.begin();
        let result = self.try_create_lane(board_uuid, &new).await;
        self.finish("create lane", result)
    }

    async fn try_create_lane(&mut self, board_uuid: &str, new: &NewLane) -> Result<Lane, ClientError> {
        let lane = self.api.create_lane(board_uuid, new).await?;
        if new.position.is_some() {
            self.state.lanes = self.api.list_lanes(board_uuid).await?;
            self.sort_lanes();
        } else {
            self.state.lanes.push(lane.clone());
        }
        Ok(lane)
    }

    pub async fn update_lane(&mut self, uuid: &str, patch: LanePatch) -> Result<Lane, ClientError> {
        self.begin();
        let result = self.try_update_lane(uuid, &patch).await;
        self.finish("update lane", result)
    }

    async fn try_update_lane(&mut self, uuid: &str, patch: &LanePatch) -> Result<Lane, ClientError> {
        let updated = self.api.update_lane(uuid, patch).await?;
        if patch.position.is_some() {
            self.state.lanes = self.api.list_lanes(&updated.board_uuid).await?;
            self.sort_lanes();
        } else if let Some(lane) = self.state.lanes.iter_mut().find(|l| l.uuid == uuid) {
            *lane = updated.clone();
        }
        Ok(updated)
    }

    /// Delete a lane and drop its cards locally.
    pub async fn delete_lane(&mut self, uuid: &str) -> Result<(), ClientError> {
        self.begin();
        let result = self.try_delete_lane(uuid).await;
        self.finish("delete lane", result)
    }

    async fn try_delete_lane(&mut self, uuid: &str) -> Result<(), ClientError> {
        self.api.delete_lane(uuid).await?;
        if self.state.lanes.iter().any(|l| l.uuid == uuid) {
            self.state.cards.retain(|c| c.lane_uuid != uuid);
            self.state.lanes.retain(|l| l.uuid != uuid);
            ordering::renumber(&mut self.state.lanes);
        }
        Ok(())
    }
}
