use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row, Transaction};
use uuid::Uuid;

use super::{
    account::{Account, Customer, Loan, LoanPosition, User},
    error::{StoreError, LOAN_ACCRUAL},
    income::{BankIncomeRecord, DateRange, IncomeStats, KindTotal},
    request::{
        RequestFilter, RequestPage, RequestSummary, ReversalMark, Settlement, StatusCounts,
        WithdrawalRequest,
    },
    store::{IncomeStore, LedgerStore, LedgerTx},
    tx::TransactionRecord,
    utils::{count_column, enum_column, is_unique_violation, like_pattern, to_i64, violated_unique},
};

const SUMMARY_SELECT: &str = r#"
    SELECT r.*, a.account_number, c.full_name AS customer_name
    FROM withdrawal_requests r
    JOIN accounts a ON a.id = r.account_id
    LEFT JOIN customers c ON c.id = a.customer_id
"#;

const TRANSACTION_COLUMNS: &str = "id, account_id, amount, transaction_type, category, status, \
     reference_id, description, request_id, created_at";

const LOAN_ACCRUAL_INDEX: &str = "bank_income_loan_accrual_uniq";

const INCOME_COLUMNS: &str = "id, kind, amount, source_id, source_kind, account_id, customer_id, \
     accrual_date, created_at";

// Postgres-backed store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn request_from_row(row: &PgRow) -> Result<WithdrawalRequest, StoreError> {
    Ok(WithdrawalRequest {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        amount: row.try_get("amount")?,
        kind: enum_column(row, "kind")?,
        description: row.try_get("description")?,
        reference: row.try_get("reference")?,
        to_account_number: row.try_get("to_account_number")?,
        to_customer_name: row.try_get("to_customer_name")?,
        status: enum_column(row, "status")?,
        charge_applied: row.try_get("charge_applied")?,
        requested_by: row.try_get("requested_by")?,
        approved_by: row.try_get("approved_by")?,
        settled_at: row.try_get("settled_at")?,
        rejection_reason: row.try_get("rejection_reason")?,
        is_reversed: row.try_get("is_reversed")?,
        reversed_by: row.try_get("reversed_by")?,
        reversed_at: row.try_get("reversed_at")?,
        reversal_reason: row.try_get("reversal_reason")?,
        created_at: row.try_get("created_at")?,
    })
}

fn summary_from_row(row: &PgRow) -> Result<RequestSummary, StoreError> {
    Ok(RequestSummary {
        request: request_from_row(row)?,
        account_number: row.try_get("account_number")?,
        customer_name: row.try_get("customer_name")?,
    })
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    Ok(Account {
        id: row.try_get("id")?,
        account_number: row.try_get("account_number")?,
        customer_id: row.try_get("customer_id")?,
        balance: row.try_get("balance")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<TransactionRecord, StoreError> {
    Ok(TransactionRecord {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        amount: row.try_get("amount")?,
        transaction_type: enum_column(row, "transaction_type")?,
        category: enum_column(row, "category")?,
        status: enum_column(row, "status")?,
        reference_id: row.try_get("reference_id")?,
        description: row.try_get("description")?,
        request_id: row.try_get("request_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn income_from_row(row: &PgRow) -> Result<BankIncomeRecord, StoreError> {
    Ok(BankIncomeRecord {
        id: row.try_get("id")?,
        kind: enum_column(row, "kind")?,
        amount: row.try_get("amount")?,
        source_id: row.try_get("source_id")?,
        source_kind: enum_column(row, "source_kind")?,
        account_id: row.try_get("account_id")?,
        customer_id: row.try_get("customer_id")?,
        accrual_date: row.try_get("accrual_date")?,
        created_at: row.try_get("created_at")?,
    })
}

fn push_request_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &RequestFilter) {
    builder.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        builder.push(" AND r.status = ").push_bind(status.as_str());
    }
    if let Some(kind) = filter.kind {
        builder.push(" AND r.kind = ").push_bind(kind.as_str());
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        builder.push(" AND (");
        let columns = [
            "r.reference",
            "r.description",
            "r.to_account_number",
            "r.to_customer_name",
            "a.account_number",
            "c.full_name",
        ];
        for (index, column) in columns.iter().enumerate() {
            if index > 0 {
                builder.push(" OR ");
            }
            builder.push(*column).push(" ILIKE ").push_bind(pattern.clone());
        }
        builder.push(")");
    }
}

fn push_range(builder: &mut QueryBuilder<'_, Postgres>, range: &DateRange) {
    builder.push(" WHERE TRUE");
    if let Some(from) = range.from() {
        builder.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = range.to() {
        builder.push(" AND created_at <= ").push_bind(to);
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        sqlx::query("SELECT id, account_number, customer_id, balance FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(account_from_row)
            .transpose()
    }

    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query("SELECT id, full_name FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(Customer {
                id: row.try_get("id")?,
                full_name: row.try_get("full_name")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, full_name, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(User {
                id: row.try_get("id")?,
                full_name: row.try_get("full_name")?,
                role: enum_column(&row, "role")?,
            })),
            None => Ok(None),
        }
    }

    async fn insert_request(&self, request: &WithdrawalRequest) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO withdrawal_requests
                (id, account_id, amount, kind, description, reference, to_account_number,
                 to_customer_name, status, charge_applied, requested_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(request.id)
        .bind(request.account_id)
        .bind(request.amount)
        .bind(request.kind.as_str())
        .bind(&request.description)
        .bind(&request.reference)
        .bind(&request.to_account_number)
        .bind(&request.to_customer_name)
        .bind(request.status.as_str())
        .bind(request.charge_applied)
        .bind(request.requested_by)
        .bind(request.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::conflict("withdrawal request", request.id.to_string())
            } else {
                err.into()
            }
        })?;
        Ok(())
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<RequestSummary>, StoreError> {
        let mut builder = QueryBuilder::new(SUMMARY_SELECT);
        builder.push(" WHERE r.id = ").push_bind(id);
        builder
            .build()
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(summary_from_row)
            .transpose()
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<RequestPage, StoreError> {
        let mut page_query = QueryBuilder::new(SUMMARY_SELECT);
        push_request_filters(&mut page_query, filter);
        page_query
            .push(" ORDER BY r.created_at DESC, r.id LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(to_i64(filter.offset()));

        let mut total_query = QueryBuilder::new(
            "SELECT COUNT(*) AS total FROM withdrawal_requests r \
             JOIN accounts a ON a.id = r.account_id \
             LEFT JOIN customers c ON c.id = a.customer_id",
        );
        push_request_filters(&mut total_query, filter);

        let counts_query = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'approved') AS approved,
                   COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                   COUNT(*) FILTER (WHERE status = 'rejected') AS rejected
            FROM withdrawal_requests
            "#,
        );

        let (rows, total_row, counts_row) = futures::try_join!(
            page_query.build().fetch_all(&self.pool),
            total_query.build().fetch_one(&self.pool),
            counts_query.fetch_one(&self.pool),
        )?;

        let items = rows
            .iter()
            .map(summary_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RequestPage {
            items,
            total: count_column(&total_row, "total")?,
            counts: StatusCounts {
                total: count_column(&counts_row, "total")?,
                approved: count_column(&counts_row, "approved")?,
                pending: count_column(&counts_row, "pending")?,
                rejected: count_column(&counts_row, "rejected")?,
            },
        })
    }

    async fn approved_withdrawals(&self) -> Result<Vec<WithdrawalRequest>, StoreError> {
        sqlx::query(
            "SELECT * FROM withdrawal_requests \
             WHERE status = 'approved' AND kind = 'withdrawal' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(request_from_row)
        .collect()
    }

    async fn transactions_for_request(&self, request_id: Uuid) -> Result<Vec<TransactionRecord>, StoreError> {
        sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE request_id = $1 ORDER BY created_at"
        ))
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(transaction_from_row)
        .collect()
    }

    async fn active_loans(&self) -> Result<Vec<LoanPosition>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT l.id, l.account_id, l.customer_id, l.annual_rate, l.status, a.balance
            FROM loans l
            JOIN accounts a ON a.id = l.account_id
            WHERE l.status = 'active'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(LoanPosition {
                    loan: Loan {
                        id: row.try_get("id")?,
                        account_id: row.try_get("account_id")?,
                        customer_id: row.try_get("customer_id")?,
                        annual_rate: row.try_get("annual_rate")?,
                        status: enum_column(row, "status")?,
                    },
                    balance: row.try_get("balance")?,
                })
            })
            .collect()
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn lock_request(&mut self, id: Uuid) -> Result<Option<WithdrawalRequest>, StoreError> {
        sqlx::query("SELECT * FROM withdrawal_requests WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .as_ref()
            .map(request_from_row)
            .transpose()
    }

    async fn lock_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError> {
        sqlx::query(
            "SELECT id, account_number, customer_id, balance FROM accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .as_ref()
        .map(account_from_row)
        .transpose()
    }

    async fn adjust_balance(&mut self, account_id: Uuid, delta: Decimal) -> Result<Decimal, StoreError> {
        let row = sqlx::query("UPDATE accounts SET balance = balance + $1 WHERE id = $2 RETURNING balance")
            .bind(delta)
            .bind(account_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.try_get("balance")?)
    }

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO transactions ({TRANSACTION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(record.id)
        .bind(record.account_id)
        .bind(record.amount)
        .bind(record.transaction_type.as_str())
        .bind(record.category.as_str())
        .bind(record.status.as_str())
        .bind(&record.reference_id)
        .bind(&record.description)
        .bind(record.request_id)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn settle_request(&mut self, id: Uuid, settlement: &Settlement) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = $1, approved_by = $2, settled_at = $3, charge_applied = $4, rejection_reason = $5
            WHERE id = $6 AND status = 'pending'
            "#,
        )
        .bind(settlement.status.as_str())
        .bind(settlement.actor)
        .bind(settlement.at)
        .bind(settlement.charge_applied)
        .bind(&settlement.reason)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_reversed(&mut self, id: Uuid, mark: &ReversalMark) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET is_reversed = TRUE, reversed_by = $1, reversed_at = $2, reversal_reason = $3
            WHERE id = $4 AND status = 'approved' AND is_reversed = FALSE
            "#,
        )
        .bind(mark.actor)
        .bind(mark.at)
        .bind(&mark.reason)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl IncomeStore for PgStore {
    async fn append_income(&self, record: &BankIncomeRecord) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO bank_income ({INCOME_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(record.id)
        .bind(record.kind.as_str())
        .bind(record.amount)
        .bind(record.source_id)
        .bind(record.source_kind.as_str())
        .bind(record.account_id)
        .bind(record.customer_id)
        .bind(record.accrual_date)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| match (violated_unique(&err), record.accrual_date) {
            (Some(LOAN_ACCRUAL_INDEX), Some(date)) => {
                StoreError::conflict(LOAN_ACCRUAL, format!("{}@{date}", record.source_id))
            }
            _ => err.into(),
        })?;
        Ok(())
    }

    async fn income_stats(&self, range: &DateRange) -> Result<IncomeStats, StoreError> {
        let mut builder =
            QueryBuilder::new("SELECT kind, SUM(amount) AS amount, COUNT(*) AS count FROM bank_income");
        push_range(&mut builder, range);
        builder.push(" GROUP BY kind");
        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut stats = IncomeStats::from_records(std::iter::empty());
        for row in &rows {
            let amount: Decimal = row.try_get("amount")?;
            let count = count_column(row, "count")?;
            stats.total_amount += amount;
            stats.total_count += count;
            stats
                .breakdown_by_kind
                .insert(enum_column(row, "kind")?, KindTotal { amount, count });
        }
        Ok(stats)
    }

    async fn income_page(
        &self,
        range: &DateRange,
        skip: u64,
        take: u64,
    ) -> Result<(Vec<BankIncomeRecord>, u64), StoreError> {
        let mut page_query = QueryBuilder::new(format!("SELECT {INCOME_COLUMNS} FROM bank_income"));
        push_range(&mut page_query, range);
        page_query
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(to_i64(take))
            .push(" OFFSET ")
            .push_bind(to_i64(skip));

        let mut total_query = QueryBuilder::new("SELECT COUNT(*) AS total FROM bank_income");
        push_range(&mut total_query, range);

        let (rows, total_row) = futures::try_join!(
            page_query.build().fetch_all(&self.pool),
            total_query.build().fetch_one(&self.pool),
        )?;

        let records = rows
            .iter()
            .map(income_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((records, count_column(&total_row, "total")?))
    }

    async fn income_for_source(&self, source_id: Uuid) -> Result<Vec<BankIncomeRecord>, StoreError> {
        sqlx::query(&format!(
            "SELECT {INCOME_COLUMNS} FROM bank_income WHERE source_id = $1 ORDER BY created_at"
        ))
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(income_from_row)
        .collect()
    }
}
