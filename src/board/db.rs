use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use super::models::*;
use super::ordering::{self, index_of};
use super::proxy::{Row, SqlProxy, Statement};
use crate::errors::{BoardError, Entity, StoreError};

const BOARD_SELECT: &str = "SELECT id AS id, uuid AS uuid, name AS name, description AS description, \
     date_created AS date_created, date_updated AS date_updated FROM kanban_board";

const LANE_SELECT: &str = "SELECT l.id AS id, l.uuid AS uuid, l.board_id AS board_id, b.uuid AS board_uuid, \
     l.name AS name, l.position AS position, l.date_created AS date_created, l.date_updated AS date_updated \
     FROM kanban_swim_lane l JOIN kanban_board b ON b.id = l.board_id";

const CARD_SELECT: &str = "SELECT c.id AS id, c.uuid AS uuid, c.lane_id AS lane_id, l.uuid AS lane_uuid, \
     c.title AS title, c.description AS description, c.priority AS priority, c.position AS position, \
     c.date_created AS date_created, c.date_updated AS date_updated \
     FROM kanban_card c JOIN kanban_swim_lane l ON l.id = c.lane_id";

pub const DEFAULT_BOARD_NAME: &str = "Default Board";
pub const DEFAULT_BOARD_DESCRIPTION: &str = "Your first Kanban board";
pub const DEFAULT_LANES: [&str; 3] = ["To Do", "In Progress", "Done"];

fn decode<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)).map_err(StoreError::from))
        .collect()
}

fn count_of(rows: &[Row]) -> Result<i64, StoreError> {
    rows.first()
        .and_then(|row| row.get("count"))
        .and_then(Value::as_i64)
        .ok_or_else(|| StoreError::Decode("count query returned no count column".into()))
}

fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Statements that shift already-stored siblings to make room at `target`.
fn make_room<T: ordering::Ranked>(
    siblings: &[T],
    target: usize,
    table: &str,
    id_of: impl Fn(&T) -> i64,
) -> Vec<Statement> {
    siblings
        .iter()
        .enumerate()
        .filter_map(|(index, sibling)| {
            let want = (if index < target { index } else { index + 1 }) as i64;
            (sibling.position() != want).then(|| position_update(table, want, id_of(sibling)))
        })
        .collect()
}

fn position_update(table: &str, position: i64, id: i64) -> Statement {
    Statement::new(format!("UPDATE {} SET position = ?1 WHERE id = ?2", table))
        .bind(position)
        .bind(id)
}

/// Data access for boards, lanes and cards on top of a [`SqlProxy`].
///
/// Every external reference is a uuid; internal ids stay inside this type.
///
/// Positional writes read the sibling rows before sending their batch, and the
/// batch alone is atomic. Concurrent writes to one lane may plan against the
/// same snapshot; the last batch wins.
#[derive(Clone)]
pub struct BoardDb {
    proxy: Arc<dyn SqlProxy>,
}

impl BoardDb {
    pub fn new(proxy: Arc<dyn SqlProxy>) -> Self {
        Self { proxy }
    }

    pub fn proxy(&self) -> &Arc<dyn SqlProxy> {
        &self.proxy
    }

    async fn fetch<T: DeserializeOwned>(&self, statement: Statement) -> Result<Vec<T>, StoreError> {
        decode(self.proxy.query(statement).await?)
    }

    async fn fetch_one<T: DeserializeOwned>(&self, statement: Statement) -> Result<Option<T>, StoreError> {
        Ok(self.fetch(statement).await?.into_iter().next())
    }

    async fn execute(&self, statements: Vec<Statement>) -> Result<(), StoreError> {
        self.proxy.execute_all(statements).await.inspect_err(|e| {
            error!(backend = self.proxy.backend(), error = %e, "Write batch failed");
        })
    }

    // ── Boards ────────────────────────────────────────────────────────

    pub async fn list_boards(&self) -> Result<Vec<Board>, BoardError> {
        let rows: Vec<BoardRow> = self
            .fetch(Statement::new(format!(
                "{} ORDER BY date_created DESC, id DESC",
                BOARD_SELECT
            )))
            .await?;
        Ok(rows.into_iter().map(BoardRow::into_board).collect())
    }

    async fn board_row(&self, uuid: &str) -> Result<BoardRow, BoardError> {
        self.fetch_one(Statement::new(format!("{} WHERE uuid = ?1", BOARD_SELECT)).bind(uuid))
            .await?
            .ok_or_else(|| BoardError::not_found(Entity::Board))
    }

    pub async fn get_board(&self, uuid: &str) -> Result<Board, BoardError> {
        Ok(self.board_row(uuid).await?.into_board())
    }

    pub async fn create_board(&self, new: &NewBoard) -> Result<Board, BoardError> {
        let uuid = new_uuid();
        self.proxy
            .query(
                Statement::new("INSERT INTO kanban_board (uuid, name, description) VALUES (?1, ?2, ?3)")
                    .bind(&uuid)
                    .bind(&new.name)
                    .bind(&new.description),
            )
            .await?;
        let board = self.get_board(&uuid).await?;
        info!(board = %board.uuid, name = %board.name, "Created board");
        Ok(board)
    }

    pub async fn update_board(&self, uuid: &str, patch: &BoardPatch) -> Result<Board, BoardError> {
        let row = self.board_row(uuid).await?;

        let mut sets = vec!["date_updated = CURRENT_TIMESTAMP".to_string()];
        let mut statement = Statement::new("");
        if let Some(name) = &patch.name {
            statement = statement.bind(name);
            sets.push(format!("name = ?{}", statement.params.len()));
        }
        if let Some(description) = &patch.description {
            statement = statement.bind(description);
            sets.push(format!("description = ?{}", statement.params.len()));
        }
        statement = statement.bind(row.id);
        statement.sql = format!(
            "UPDATE kanban_board SET {} WHERE id = ?{}",
            sets.join(", "),
            statement.params.len()
        );
        self.proxy.query(statement).await?;

        self.get_board(uuid).await
    }

    /// Deletes the board with all its lanes and their cards.
    pub async fn delete_board(&self, uuid: &str) -> Result<(), BoardError> {
        let row = self.board_row(uuid).await?;
        let lanes = self.lane_rows(row.id).await?;

        let mut statements: Vec<Statement> = lanes
            .iter()
            .map(|lane| Statement::new("DELETE FROM kanban_card WHERE lane_id = ?1").bind(lane.id))
            .collect();
        statements.push(Statement::new("DELETE FROM kanban_swim_lane WHERE board_id = ?1").bind(row.id));
        statements.push(Statement::new("DELETE FROM kanban_board WHERE id = ?1").bind(row.id));
        self.execute(statements).await?;

        info!(board = %uuid, lanes = lanes.len(), "Deleted board");
        Ok(())
    }

    // ── Lanes ─────────────────────────────────────────────────────────

    async fn lane_rows(&self, board_id: i64) -> Result<Vec<LaneRow>, StoreError> {
        self.fetch(
            Statement::new(format!(
                "{} WHERE l.board_id = ?1 ORDER BY l.position ASC, l.id ASC",
                LANE_SELECT
            ))
            .bind(board_id),
        )
        .await
    }

    async fn lane_row(&self, uuid: &str, entity: Entity) -> Result<LaneRow, BoardError> {
        self.fetch_one(Statement::new(format!("{} WHERE l.uuid = ?1", LANE_SELECT)).bind(uuid))
            .await?
            .ok_or_else(|| BoardError::not_found(entity))
    }

    pub async fn list_lanes(&self, board_uuid: &str) -> Result<Vec<Lane>, BoardError> {
        let board = self.board_row(board_uuid).await?;
        let rows = self.lane_rows(board.id).await?;
        Ok(rows.into_iter().map(LaneRow::into_lane).collect())
    }

    pub async fn get_lane(&self, uuid: &str) -> Result<Lane, BoardError> {
        Ok(self.lane_row(uuid, Entity::Lane).await?.into_lane())
    }

    /// Inserts a lane at `position` (clamped; default: after the last lane),
    /// shifting later lanes down.
    pub async fn create_lane(&self, board_uuid: &str, new: &NewLane) -> Result<Lane, BoardError> {
        let board = self.board_row(board_uuid).await?;
        let siblings = self.lane_rows(board.id).await?;
        let target = ordering::clamp_index(
            new.position.map(index_of).unwrap_or(siblings.len()),
            siblings.len(),
        );

        let uuid = new_uuid();
        let mut statements = make_room(&siblings, target, "kanban_swim_lane", |l| l.id);
        statements.push(
            Statement::new(
                "INSERT INTO kanban_swim_lane (uuid, board_id, name, position) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&uuid)
            .bind(board.id)
            .bind(&new.name)
            .bind(target as i64),
        );
        self.execute(statements).await?;

        let lane = self.get_lane(&uuid).await?;
        info!(board = %board_uuid, lane = %lane.uuid, position = lane.position, "Created lane");
        Ok(lane)
    }

    pub async fn update_lane(&self, uuid: &str, patch: &LanePatch) -> Result<Lane, BoardError> {
        let row = self.lane_row(uuid, Entity::Lane).await?;

        let mut statements = Vec::new();
        match &patch.name {
            Some(name) => statements.push(
                Statement::new(
                    "UPDATE kanban_swim_lane SET name = ?1, date_updated = CURRENT_TIMESTAMP WHERE id = ?2",
                )
                .bind(name)
                .bind(row.id),
            ),
            None => statements.push(
                Statement::new("UPDATE kanban_swim_lane SET date_updated = CURRENT_TIMESTAMP WHERE id = ?1")
                    .bind(row.id),
            ),
        }

        if let Some(position) = patch.position {
            let mut siblings = self.lane_rows(row.board_id).await?;
            if let Some(from) = siblings.iter().position(|l| l.id == row.id) {
                ordering::reorder(&mut siblings, from, index_of(position));
                for index in ordering::renumber(&mut siblings) {
                    let lane = &siblings[index];
                    statements.push(position_update("kanban_swim_lane", lane.position, lane.id));
                }
            }
        }
        self.execute(statements).await?;

        self.get_lane(uuid).await
    }

    /// Deletes the lane and its cards, then closes the gap it leaves.
    pub async fn delete_lane(&self, uuid: &str) -> Result<(), BoardError> {
        let row = self.lane_row(uuid, Entity::Lane).await?;
        let mut siblings = self.lane_rows(row.board_id).await?;
        siblings.retain(|l| l.id != row.id);

        let mut statements = vec![
            Statement::new("DELETE FROM kanban_card WHERE lane_id = ?1").bind(row.id),
            Statement::new("DELETE FROM kanban_swim_lane WHERE id = ?1").bind(row.id),
        ];
        for index in ordering::renumber(&mut siblings) {
            let lane = &siblings[index];
            statements.push(position_update("kanban_swim_lane", lane.position, lane.id));
        }
        self.execute(statements).await?;

        info!(lane = %uuid, "Deleted lane");
        Ok(())
    }

    // ── Cards ─────────────────────────────────────────────────────────

    async fn card_rows(&self, lane_id: i64) -> Result<Vec<CardRow>, StoreError> {
        self.fetch(
            Statement::new(format!(
                "{} WHERE c.lane_id = ?1 ORDER BY c.position ASC, c.id ASC",
                CARD_SELECT
            ))
            .bind(lane_id),
        )
        .await
    }

    async fn card_row(&self, uuid: &str) -> Result<CardRow, BoardError> {
        self.fetch_one(Statement::new(format!("{} WHERE c.uuid = ?1", CARD_SELECT)).bind(uuid))
            .await?
            .ok_or_else(|| BoardError::not_found(Entity::Card))
    }

    pub async fn list_cards(&self, lane_uuid: &str) -> Result<Vec<Card>, BoardError> {
        let lane = self.lane_row(lane_uuid, Entity::Lane).await?;
        let rows = self.card_rows(lane.id).await?;
        let cards = rows
            .into_iter()
            .map(CardRow::into_card)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    pub async fn get_card(&self, uuid: &str) -> Result<Card, BoardError> {
        Ok(self.card_row(uuid).await?.into_card()?)
    }

    /// Inserts a card at `position` (clamped; default: after the last card),
    /// shifting later cards down.
    pub async fn create_card(&self, lane_uuid: &str, new: &NewCard) -> Result<Card, BoardError> {
        let lane = self.lane_row(lane_uuid, Entity::Lane).await?;
        let siblings = self.card_rows(lane.id).await?;
        let target = ordering::clamp_index(
            new.position.map(index_of).unwrap_or(siblings.len()),
            siblings.len(),
        );

        let uuid = new_uuid();
        let mut statements = make_room(&siblings, target, "kanban_card", |c| c.id);
        statements.push(
            Statement::new(
                "INSERT INTO kanban_card (uuid, lane_id, title, description, priority, position) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&uuid)
            .bind(lane.id)
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.priority.as_str())
            .bind(target as i64),
        );
        self.execute(statements).await?;

        let card = self.get_card(&uuid).await?;
        info!(lane = %lane_uuid, card = %card.uuid, position = card.position, "Created card");
        Ok(card)
    }

    pub async fn update_card(&self, uuid: &str, patch: &CardPatch) -> Result<Card, BoardError> {
        let row = self.card_row(uuid).await?;

        let mut sets = vec!["date_updated = CURRENT_TIMESTAMP".to_string()];
        let mut statement = Statement::new("");
        if let Some(title) = &patch.title {
            statement = statement.bind(title);
            sets.push(format!("title = ?{}", statement.params.len()));
        }
        if let Some(description) = &patch.description {
            statement = statement.bind(description);
            sets.push(format!("description = ?{}", statement.params.len()));
        }
        if let Some(priority) = patch.priority {
            statement = statement.bind(priority.as_str());
            sets.push(format!("priority = ?{}", statement.params.len()));
        }
        statement = statement.bind(row.id);
        statement.sql = format!(
            "UPDATE kanban_card SET {} WHERE id = ?{}",
            sets.join(", "),
            statement.params.len()
        );
        let mut statements = vec![statement];

        if patch.relocates() {
            let target = match &patch.lane_uuid {
                Some(lane_uuid) => self.lane_row(lane_uuid, Entity::TargetLane).await?,
                None => self.lane_row(&row.lane_uuid, Entity::Lane).await?,
            };
            let to = match patch.position {
                Some(position) => index_of(position),
                None if target.id == row.lane_id => index_of(row.position),
                // A lane change without a position appends.
                None => usize::MAX,
            };
            statements.extend(self.relocation(&row, &target, to).await?);
        }
        self.execute(statements).await?;

        self.get_card(uuid).await
    }

    /// Moves a card to `position` in the lane `lane_uuid`.
    ///
    /// Both the source and destination lanes are renumbered and every changed
    /// position is persisted, so stored positions stay dense.
    pub async fn move_card(&self, uuid: &str, lane_uuid: &str, position: i64) -> Result<Card, BoardError> {
        let card = self.card_row(uuid).await?;
        let target = self.lane_row(lane_uuid, Entity::TargetLane).await?;

        let statements = self.relocation(&card, &target, index_of(position)).await?;
        self.execute(statements).await?;

        let moved = self.get_card(uuid).await?;
        info!(
            card = %uuid,
            from_lane = %card.lane_uuid,
            to_lane = %lane_uuid,
            position = moved.position,
            "Moved card"
        );
        Ok(moved)
    }

    /// Plans the writes that put `card` at index `to` of `target`.
    async fn relocation(
        &self,
        card: &CardRow,
        target: &LaneRow,
        to: usize,
    ) -> Result<Vec<Statement>, StoreError> {
        let mut source = self.card_rows(card.lane_id).await?;
        let from = match source.iter().position(|c| c.id == card.id) {
            Some(from) => from,
            None => {
                source.push(card.clone());
                source.len() - 1
            }
        };

        let mut statements = Vec::new();
        let mut final_position = 0;
        if target.id == card.lane_id {
            ordering::reorder(&mut source, from, to);
            for index in ordering::renumber(&mut source) {
                let c = &source[index];
                if c.id != card.id {
                    statements.push(position_update("kanban_card", c.position, c.id));
                }
            }
            if let Some(moved) = source.iter().find(|c| c.id == card.id) {
                final_position = moved.position;
            }
        } else {
            let mut dest = self.card_rows(target.id).await?;
            ordering::transfer(&mut source, from, &mut dest, to);
            for index in ordering::renumber(&mut source) {
                let c = &source[index];
                statements.push(position_update("kanban_card", c.position, c.id));
            }
            // Positions already in the destination were taken from the old lane.
            if let Some(moved) = dest.iter_mut().find(|c| c.id == card.id) {
                moved.position = -1;
            }
            for index in ordering::renumber(&mut dest) {
                let c = &dest[index];
                if c.id == card.id {
                    final_position = c.position;
                } else {
                    statements.push(position_update("kanban_card", c.position, c.id));
                }
            }
        }

        statements.push(
            Statement::new(
                "UPDATE kanban_card SET lane_id = ?1, position = ?2, date_updated = CURRENT_TIMESTAMP WHERE id = ?3",
            )
            .bind(target.id)
            .bind(final_position)
            .bind(card.id),
        );
        Ok(statements)
    }

    /// Deletes the card and closes the gap it leaves in its lane.
    pub async fn delete_card(&self, uuid: &str) -> Result<(), BoardError> {
        let row = self.card_row(uuid).await?;
        let mut siblings = self.card_rows(row.lane_id).await?;
        siblings.retain(|c| c.id != row.id);

        let mut statements = vec![Statement::new("DELETE FROM kanban_card WHERE id = ?1").bind(row.id)];
        for index in ordering::renumber(&mut siblings) {
            let card = &siblings[index];
            statements.push(position_update("kanban_card", card.position, card.id));
        }
        self.execute(statements).await?;

        info!(card = %uuid, "Deleted card");
        Ok(())
    }

    // ── Default data & verification ──────────────────────────────────

    /// Creates the default board with its three lanes when no board exists.
    pub async fn seed_default_board(&self) -> Result<Option<Board>, BoardError> {
        let rows = self
            .proxy
            .query(Statement::new("SELECT COUNT(*) AS count FROM kanban_board"))
            .await?;
        if count_of(&rows)? > 0 {
            return Ok(None);
        }

        info!("Initializing default board and swim lanes");
        let board = self
            .create_board(&NewBoard {
                name: DEFAULT_BOARD_NAME.to_string(),
                description: DEFAULT_BOARD_DESCRIPTION.to_string(),
            })
            .await?;
        for (position, name) in DEFAULT_LANES.iter().enumerate() {
            self.create_lane(
                &board.uuid,
                &NewLane {
                    name: name.to_string(),
                    position: Some(position as i64),
                },
            )
            .await?;
        }
        Ok(Some(board))
    }

    /// Exercises connection, read and write paths against the proxy.
    pub async fn verify(&self) -> VerifyReport {
        let mut checks = VerifyChecks::default();
        match self.run_checks(&mut checks).await {
            Ok(()) => VerifyReport {
                status: "success".to_string(),
                message: "API verification successful".to_string(),
                error: None,
                tests: checks,
            },
            Err(e) => {
                error!(error = %e, ?checks, "API verification failed");
                VerifyReport {
                    status: "error".to_string(),
                    message: "API verification failed".to_string(),
                    error: Some(e.to_string()),
                    tests: checks,
                }
            }
        }
    }

    async fn run_checks(&self, checks: &mut VerifyChecks) -> Result<(), StoreError> {
        self.proxy.query(Statement::new("SELECT 1 AS test")).await?;
        checks.connection = true;

        let rows = self
            .proxy
            .query(Statement::new("SELECT COUNT(*) AS count FROM kanban_board"))
            .await?;
        count_of(&rows)?;
        checks.read = true;

        let uuid = new_uuid();
        self.proxy
            .query(
                Statement::new("INSERT INTO kanban_board (uuid, name, description) VALUES (?1, ?2, ?3)")
                    .bind(&uuid)
                    .bind("Test Board")
                    .bind("Test Description"),
            )
            .await?;
        let rows = self
            .proxy
            .query(Statement::new("SELECT id AS id FROM kanban_board WHERE uuid = ?1").bind(&uuid))
            .await?;
        let id = rows
            .first()
            .and_then(|row| row.get("id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::Decode("test board missing after insert".into()))?;
        self.proxy
            .query(Statement::new("DELETE FROM kanban_board WHERE id = ?1").bind(id))
            .await?;
        checks.write = true;
        Ok(())
    }
}
