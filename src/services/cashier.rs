use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IsolationLevel, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        cash_movement::{self, Entity as CashMovementEntity},
        cashier_session::{self, Entity as CashierSessionEntity},
        payment::{self, Entity as PaymentEntity},
        payment_method::{self, Entity as PaymentMethodEntity},
        sale,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::payments::PaymentStatus,
    services::reports::PaymentMethodBreakdown,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Deposit,
    Withdrawal,
    Adjustment,
}

/// Signed drawer effect of a movement. Adjustments carry their own sign
/// in the amount; withdrawals subtract.
pub(crate) fn movement_effect(kind: MovementKind, amount: Decimal) -> Decimal {
    match kind {
        MovementKind::Deposit | MovementKind::Adjustment => amount,
        MovementKind::Withdrawal => -amount,
    }
}

/// Expected closing amount for a drawer: the float it opened with, plus
/// cash collected from sales, plus the net effect of manual movements.
pub(crate) fn expected_closing(
    opening: Decimal,
    cash_payments: Decimal,
    movements: &[(MovementKind, Decimal)],
) -> Decimal {
    let net: Decimal = movements
        .iter()
        .map(|(kind, amount)| movement_effect(*kind, *amount))
        .sum();
    opening + cash_payments + net
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct OpenSessionRequest {
    pub establishment_id: Uuid,
    pub user_id: Uuid,
    pub opening_amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CloseSessionRequest {
    pub closing_amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecordMovementRequest {
    pub kind: MovementKind,
    pub amount: Decimal,
    #[validate(length(min = 1, message = "A reason is required"))]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub establishment_id: Uuid,
    pub user_id: Uuid,
    pub opening_amount: Decimal,
    pub closing_amount: Option<Decimal>,
    pub expected_amount: Option<Decimal>,
    pub difference: Option<Decimal>,
    pub notes: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MovementResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub kind: MovementKind,
    pub amount: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Per-session breakdown: everything that moved through the drawer plus
/// the sales taken during the session window.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionReport {
    pub session: SessionResponse,
    pub sales_count: u64,
    pub revenue: Decimal,
    pub average_ticket: Decimal,
    pub payments_by_method: Vec<PaymentMethodBreakdown>,
    pub cash_payments: Decimal,
    pub deposits: Decimal,
    pub withdrawals: Decimal,
    pub adjustments: Decimal,
    pub expected_amount: Decimal,
    pub movements: Vec<MovementResponse>,
}

/// All session reports for one establishment on one calendar day (UTC),
/// with drawer totals across them.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailyReport {
    pub establishment_id: Uuid,
    pub date: NaiveDate,
    pub sessions_count: u64,
    pub revenue: Decimal,
    pub cash_payments: Decimal,
    pub deposits: Decimal,
    pub withdrawals: Decimal,
    pub adjustments: Decimal,
    pub total_difference: Decimal,
    pub sessions: Vec<SessionReport>,
}

/// Service owning cashier sessions and their manual cash movements.
#[derive(Clone)]
pub struct CashierService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl CashierService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Opens a session for a user. The open check and the insert share a
    /// serializable transaction so two concurrent opens cannot both
    /// succeed; under weaker isolation both could pass the pre-check.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn open_session(
        &self,
        request: OpenSessionRequest,
    ) -> Result<SessionResponse, ServiceError> {
        if request.opening_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Opening amount cannot be negative".to_string(),
            ));
        }

        let db = &*self.db;
        let txn = db
            .begin_with_config(Some(IsolationLevel::Serializable), None)
            .await?;

        let existing = CashierSessionEntity::find()
            .filter(cashier_session::Column::UserId.eq(request.user_id))
            .filter(cashier_session::Column::ClosedAt.is_null())
            .one(&txn)
            .await?;
        if let Some(open) = existing {
            return Err(ServiceError::Conflict(format!(
                "User {} already has an open session ({})",
                request.user_id, open.id
            )));
        }

        let session = cashier_session::ActiveModel {
            id: Set(Uuid::new_v4()),
            establishment_id: Set(request.establishment_id),
            user_id: Set(request.user_id),
            opening_amount: Set(request.opening_amount),
            closing_amount: Set(None),
            expected_amount: Set(None),
            difference: Set(None),
            notes: Set(request.notes),
            opened_at: Set(Utc::now()),
            closed_at: Set(None),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(session_id = %session.id, user_id = %session.user_id, "Cashier session opened");

        self.emit(Event::SessionOpened {
            session_id: session.id,
            user_id: session.user_id,
        })
        .await;

        Ok(session_to_response(session))
    }

    /// Closes a session, reconciling the declared drawer count against the
    /// expected amount. Difference is closing minus expected, so a short
    /// drawer reports negative.
    #[instrument(skip(self, request), fields(session_id = %session_id))]
    pub async fn close_session(
        &self,
        session_id: Uuid,
        request: CloseSessionRequest,
    ) -> Result<SessionResponse, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await?;

        let session = Self::find_session(&txn, session_id).await?;
        if session.closed_at.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Session {session_id} is already closed"
            )));
        }

        let closed_at = Utc::now();
        let cash_payments =
            Self::cash_payments_between(&txn, &session, session.opened_at, closed_at).await?;
        let movements = Self::movement_amounts(&txn, session_id).await?;
        let expected = expected_closing(session.opening_amount, cash_payments, &movements);
        let difference = request.closing_amount - expected;

        let mut active: cashier_session::ActiveModel = session.into();
        active.closing_amount = Set(Some(request.closing_amount));
        active.expected_amount = Set(Some(expected));
        active.difference = Set(Some(difference));
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.closed_at = Set(Some(closed_at));
        let closed = active.update(&txn).await?;

        txn.commit().await?;

        info!(
            session_id = %session_id,
            expected = %expected,
            difference = %difference,
            "Cashier session closed"
        );

        self.emit(Event::SessionClosed {
            session_id,
            difference,
        })
        .await;

        Ok(session_to_response(closed))
    }

    /// Records a manual cash movement against an open session.
    #[instrument(skip(self, request), fields(session_id = %session_id))]
    pub async fn record_movement(
        &self,
        session_id: Uuid,
        request: RecordMovementRequest,
    ) -> Result<MovementResponse, ServiceError> {
        request.validate()?;
        if request.amount <= Decimal::ZERO && request.kind != MovementKind::Adjustment {
            return Err(ServiceError::ValidationError(
                "Movement amount must be positive".to_string(),
            ));
        }

        let db = &*self.db;
        let txn = db.begin().await?;

        let session = Self::find_session(&txn, session_id).await?;
        if session.closed_at.is_some() {
            return Err(ServiceError::BadRequest(format!(
                "Session {session_id} is closed; movements are no longer accepted"
            )));
        }

        let movement = cash_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(session.id),
            kind: Set(request.kind.to_string()),
            amount: Set(request.amount),
            reason: Set(request.reason),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(movement_id = %movement.id, kind = %request.kind, "Cash movement recorded");

        self.emit(Event::CashMovementRecorded {
            session_id,
            movement_id: movement.id,
        })
        .await;

        movement_to_response(movement)
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn get_session(&self, session_id: Uuid) -> Result<SessionResponse, ServiceError> {
        let session = Self::find_session(&*self.db, session_id).await?;
        Ok(session_to_response(session))
    }

    /// Returns the user's currently open session, if any.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_open_session(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SessionResponse>, ServiceError> {
        let session = CashierSessionEntity::find()
            .filter(cashier_session::Column::UserId.eq(user_id))
            .filter(cashier_session::Column::ClosedAt.is_null())
            .one(&*self.db)
            .await?;
        Ok(session.map(session_to_response))
    }

    /// Full drawer and sales breakdown for a session. For an open session
    /// the window runs up to now; for a closed one, up to its closing time.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn session_report(&self, session_id: Uuid) -> Result<SessionReport, ServiceError> {
        let db = &*self.db;
        let session = Self::find_session(db, session_id).await?;
        Self::build_report(db, session).await
    }

    /// Session reports for every session an establishment opened on a UTC
    /// calendar day, with drawer totals across them.
    #[instrument(skip(self), fields(establishment_id = %establishment_id, %date))]
    pub async fn daily_report(
        &self,
        establishment_id: Uuid,
        date: NaiveDate,
    ) -> Result<DailyReport, ServiceError> {
        let db = &*self.db;

        let day_start = date.and_time(NaiveTime::MIN).and_utc();
        let day_end = day_start + Duration::days(1);

        let sessions = CashierSessionEntity::find()
            .filter(cashier_session::Column::EstablishmentId.eq(establishment_id))
            .filter(cashier_session::Column::OpenedAt.gte(day_start))
            .filter(cashier_session::Column::OpenedAt.lt(day_end))
            .order_by_asc(cashier_session::Column::OpenedAt)
            .all(db)
            .await?;

        let mut reports = Vec::with_capacity(sessions.len());
        for session in sessions {
            reports.push(Self::build_report(db, session).await?);
        }

        let mut daily = DailyReport {
            establishment_id,
            date,
            sessions_count: reports.len() as u64,
            revenue: Decimal::ZERO,
            cash_payments: Decimal::ZERO,
            deposits: Decimal::ZERO,
            withdrawals: Decimal::ZERO,
            adjustments: Decimal::ZERO,
            total_difference: Decimal::ZERO,
            sessions: Vec::new(),
        };
        for report in &reports {
            daily.revenue += report.revenue;
            daily.cash_payments += report.cash_payments;
            daily.deposits += report.deposits;
            daily.withdrawals += report.withdrawals;
            daily.adjustments += report.adjustments;
            daily.total_difference += report.session.difference.unwrap_or_default();
        }
        daily.sessions = reports;

        Ok(daily)
    }

    /// Sessions for an establishment, newest first.
    #[instrument(skip(self), fields(establishment_id = %establishment_id))]
    pub async fn list_sessions(
        &self,
        establishment_id: Uuid,
    ) -> Result<Vec<SessionResponse>, ServiceError> {
        let sessions = CashierSessionEntity::find()
            .filter(cashier_session::Column::EstablishmentId.eq(establishment_id))
            .order_by_desc(cashier_session::Column::OpenedAt)
            .all(&*self.db)
            .await?;
        Ok(sessions.into_iter().map(session_to_response).collect())
    }

    async fn build_report<C: ConnectionTrait>(
        conn: &C,
        session: cashier_session::Model,
    ) -> Result<SessionReport, ServiceError> {
        let window_end = session.closed_at.unwrap_or_else(Utc::now);
        let payments =
            Self::paid_payments_between(conn, &session, session.opened_at, window_end).await?;

        let mut revenue = Decimal::ZERO;
        let mut cash_payments = Decimal::ZERO;
        let mut sale_ids = HashSet::new();
        let mut by_method: HashMap<Uuid, PaymentMethodBreakdown> = HashMap::new();
        for (p, method) in &payments {
            revenue += p.amount;
            sale_ids.insert(p.sale_id);
            if method.as_ref().is_some_and(|m| m.requires_change) {
                cash_payments += p.amount;
            }
            let entry = by_method
                .entry(p.payment_method_id)
                .or_insert_with(|| PaymentMethodBreakdown {
                    payment_method_id: p.payment_method_id,
                    name: method.as_ref().map(|m| m.name.clone()).unwrap_or_default(),
                    count: 0,
                    total: Decimal::ZERO,
                });
            entry.count += 1;
            entry.total += p.amount;
        }
        let mut payments_by_method: Vec<_> = by_method.into_values().collect();
        payments_by_method.sort_by(|a, b| b.total.cmp(&a.total).then(a.name.cmp(&b.name)));

        let sales_count = sale_ids.len() as u64;
        let average_ticket = if sales_count == 0 {
            Decimal::ZERO
        } else {
            revenue / Decimal::from(sales_count)
        };

        let movements = CashMovementEntity::find()
            .filter(cash_movement::Column::SessionId.eq(session.id))
            .order_by_asc(cash_movement::Column::CreatedAt)
            .all(conn)
            .await?;

        let mut deposits = Decimal::ZERO;
        let mut withdrawals = Decimal::ZERO;
        let mut adjustments = Decimal::ZERO;
        let mut responses = Vec::with_capacity(movements.len());
        for model in movements {
            let response = movement_to_response(model)?;
            match response.kind {
                MovementKind::Deposit => deposits += response.amount,
                MovementKind::Withdrawal => withdrawals += response.amount,
                MovementKind::Adjustment => adjustments += response.amount,
            }
            responses.push(response);
        }

        let expected =
            session.opening_amount + cash_payments + deposits + adjustments - withdrawals;

        Ok(SessionReport {
            session: session_to_response(session),
            sales_count,
            revenue,
            average_ticket,
            payments_by_method,
            cash_payments,
            deposits,
            withdrawals,
            adjustments,
            expected_amount: expected,
            movements: responses,
        })
    }

    async fn find_session<C: ConnectionTrait>(
        conn: &C,
        session_id: Uuid,
    ) -> Result<cashier_session::Model, ServiceError> {
        CashierSessionEntity::find_by_id(session_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Session {session_id} not found")))
    }

    /// PAID payments at the session's establishment inside [start, end),
    /// with their methods.
    async fn paid_payments_between<C: ConnectionTrait>(
        conn: &C,
        session: &cashier_session::Model,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(payment::Model, Option<payment_method::Model>)>, ServiceError> {
        Ok(PaymentEntity::find()
            .find_also_related(PaymentMethodEntity)
            .join(JoinType::InnerJoin, payment::Relation::Sale.def())
            .filter(sale::Column::EstablishmentId.eq(session.establishment_id))
            .filter(payment::Column::Status.eq(PaymentStatus::Paid.to_string()))
            .filter(payment::Column::CreatedAt.gte(start))
            .filter(payment::Column::CreatedAt.lt(end))
            .all(conn)
            .await?)
    }

    /// Sum of PAID payments made with a cash method at the session's
    /// establishment inside [start, end).
    async fn cash_payments_between<C: ConnectionTrait>(
        conn: &C,
        session: &cashier_session::Model,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Decimal, ServiceError> {
        let payments = Self::paid_payments_between(conn, session, start, end).await?;
        Ok(payments
            .iter()
            .filter(|(_, method)| method.as_ref().is_some_and(|m| m.requires_change))
            .map(|(p, _)| p.amount)
            .sum())
    }

    async fn movement_amounts<C: ConnectionTrait>(
        conn: &C,
        session_id: Uuid,
    ) -> Result<Vec<(MovementKind, Decimal)>, ServiceError> {
        let movements = CashMovementEntity::find()
            .filter(cash_movement::Column::SessionId.eq(session_id))
            .all(conn)
            .await?;

        movements
            .into_iter()
            .map(|m| {
                let kind = MovementKind::from_str(&m.kind).map_err(|_| {
                    ServiceError::InternalError(format!("Corrupt movement kind: {}", m.kind))
                })?;
                Ok((kind, m.amount))
            })
            .collect()
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "Failed to send cashier event");
            }
        }
    }
}

fn session_to_response(model: cashier_session::Model) -> SessionResponse {
    SessionResponse {
        id: model.id,
        establishment_id: model.establishment_id,
        user_id: model.user_id,
        opening_amount: model.opening_amount,
        closing_amount: model.closing_amount,
        expected_amount: model.expected_amount,
        difference: model.difference,
        notes: model.notes,
        opened_at: model.opened_at,
        closed_at: model.closed_at,
    }
}

fn movement_to_response(model: cash_movement::Model) -> Result<MovementResponse, ServiceError> {
    let kind = MovementKind::from_str(&model.kind).map_err(|_| {
        ServiceError::InternalError(format!("Corrupt movement kind: {}", model.kind))
    })?;

    Ok(MovementResponse {
        id: model.id,
        session_id: model.session_id,
        kind,
        amount: model.amount,
        reason: model.reason,
        created_at: model.created_at,
    })
}
