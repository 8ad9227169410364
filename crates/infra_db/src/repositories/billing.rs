//! Billing repository implementation
//!
//! SQL for every billing table. Functions take the caller's connection so
//! one transaction can span a whole unit of work; the adapter owns that
//! transaction. Queries are checked at runtime and rows are mapped onto the
//! domain types by hand.
//!
//! Service usage is stored as `{svc}_qt` / `{svc}_qt_price` column pairs in
//! `ServiceComponent::ALL` order; binders and column lists must agree on it.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};

use core_kernel::{
    BillId, CustomerId, DailyBillAmountId, EntitlementId, InvoiceId, InvoiceItemId, PaymentDetailId,
    PaymentMasterId, PricingPeriodId,
};
use domain_billing::{
    BillRecord, Customer, CustomerCategory, DailyBillAmount, Invoice, InvoiceItem, NewBill, NewCustomer,
    NewDailyAmount, NewInvoice, NewPayment, PaymentDetailInput, PaymentDetails, PaymentMaster, PeriodInput,
    PricingPeriod, ServiceBreakdown, ServiceComponent, ServiceLine, ServiceQuantities, ServiceUsage,
};

use crate::error::DatabaseError;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

macro_rules! usage_columns {
    () => {
        "iig_qt, iig_qt_price, fna_qt, fna_qt_price, ggc_qt, ggc_qt_price, \
         cdn_qt, cdn_qt_price, bdix_qt, bdix_qt_price, baishan_qt, baishan_qt_price"
    };
}

macro_rules! customer_columns {
    () => {
        "id, customer_number, name, email, phone, category, is_active, created_by, created_at, updated_at"
    };
}

macro_rules! bill_columns {
    () => {
        concat!(
            "id, customer_id, bill_number, billing_date, active_date, termination_date, ",
            usage_columns!(),
            ", discount, total_bill, total_received, total_due, status, remarks, \
             created_by, updated_by, created_at, updated_at"
        )
    };
}

macro_rules! period_columns {
    () => {
        concat!(
            "id, bill_id, start_day, end_day, ",
            usage_columns!(),
            ", discount, notes, created_at, updated_at"
        )
    };
}

macro_rules! daily_columns {
    () => {
        "id, bill_id, date, pricing_period_id, iig_qt, fna_qt, ggc_qt, cdn_qt, bdix_qt, baishan_qt, \
         daily_amount, service_breakdown, is_calculated, notes, created_at, updated_at"
    };
}

macro_rules! invoice_columns {
    () => {
        "id, invoice_number, bill_id, customer_id, invoice_format, issue_date, due_date, subtotal, \
         tax_amount, discount_amount, total_amount, paid_amount, balance_due, amount_in_words, status, \
         notes, issued_at, paid_at, created_by, created_at, updated_at"
    };
}

macro_rules! item_columns {
    () => {
        "id, invoice_id, serial_number, service_name, service_type, description, unit, quantity, \
         unit_price, amount, line_total"
    };
}

macro_rules! master_columns {
    () => {
        "id, entitlement_id, invoice_id, payment_date, payment_method, remarks, received_by, created_at, updated_at"
    };
}

macro_rules! detail_columns {
    () => {
        "id, payment_master_id, pay_amount, transaction_id, status, remarks, created_at, updated_at"
    };
}

/// Entry point to billing storage
#[derive(Debug, Clone)]
pub struct BillingRepository {
    pool: PgPool,
}

impl BillingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Opens the transaction a unit of work runs in
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
    }

    /// Round-trip used by health checks
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

/// Parses a text column into a domain enum
pub(crate) fn parse_text<T>(column: &str, raw: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse().map_err(|e| DatabaseError::corrupt(column, e))
}

fn text_column<T>(row: &PgRow, column: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw: String = row.try_get(column)?;
    parse_text(column, &raw)
}

fn usage_from_row(row: &PgRow) -> Result<ServiceUsage, DatabaseError> {
    let mut usage = ServiceUsage::default();
    for component in ServiceComponent::ALL {
        let quantity: Decimal = row.try_get(format!("{}_qt", component.key()).as_str())?;
        let price: Decimal = row.try_get(format!("{}_qt_price", component.key()).as_str())?;
        *usage.get_mut(component) = ServiceLine::new(quantity, price);
    }
    Ok(usage)
}

fn quantities_from_row(row: &PgRow) -> Result<ServiceQuantities, DatabaseError> {
    let mut quantities = ServiceQuantities::default();
    for component in ServiceComponent::ALL {
        *quantities.get_mut(component) = row.try_get(format!("{}_qt", component.key()).as_str())?;
    }
    Ok(quantities)
}

fn bind_usage<'q>(mut query: PgQuery<'q>, usage: &ServiceUsage) -> PgQuery<'q> {
    for (_, line) in usage.iter() {
        query = query.bind(line.quantity).bind(line.price);
    }
    query
}

fn bind_quantities<'q>(mut query: PgQuery<'q>, quantities: &ServiceQuantities) -> PgQuery<'q> {
    for (_, quantity) in quantities.iter() {
        query = query.bind(*quantity);
    }
    query
}

fn customer_from_row(row: &PgRow) -> Result<Customer, DatabaseError> {
    let Json(category) = row.try_get::<Json<CustomerCategory>, _>("category")?;
    Ok(Customer {
        id: CustomerId::new(row.try_get("id")?),
        customer_number: row.try_get("customer_number")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        category,
        is_active: row.try_get("is_active")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn bill_from_row(row: &PgRow) -> Result<BillRecord, DatabaseError> {
    Ok(BillRecord {
        id: BillId::new(row.try_get("id")?),
        customer_id: CustomerId::new(row.try_get("customer_id")?),
        bill_number: row.try_get("bill_number")?,
        billing_date: row.try_get("billing_date")?,
        active_date: row.try_get("active_date")?,
        termination_date: row.try_get("termination_date")?,
        usage: usage_from_row(row)?,
        discount: row.try_get("discount")?,
        total_bill: row.try_get("total_bill")?,
        total_received: row.try_get("total_received")?,
        total_due: row.try_get("total_due")?,
        status: text_column(row, "status")?,
        remarks: row.try_get("remarks")?,
        created_by: row.try_get("created_by")?,
        updated_by: row.try_get("updated_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn period_from_row(row: &PgRow) -> Result<PricingPeriod, DatabaseError> {
    Ok(PricingPeriod {
        id: PricingPeriodId::new(row.try_get("id")?),
        bill_id: BillId::new(row.try_get("bill_id")?),
        start_day: row.try_get("start_day")?,
        end_day: row.try_get("end_day")?,
        usage: usage_from_row(row)?,
        discount: row.try_get("discount")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn daily_from_row(row: &PgRow) -> Result<DailyBillAmount, DatabaseError> {
    let Json(service_breakdown) = row.try_get::<Json<ServiceBreakdown>, _>("service_breakdown")?;
    Ok(DailyBillAmount {
        id: DailyBillAmountId::new(row.try_get("id")?),
        bill_id: BillId::new(row.try_get("bill_id")?),
        date: row.try_get("date")?,
        pricing_period_id: row
            .try_get::<Option<i64>, _>("pricing_period_id")?
            .map(PricingPeriodId::new),
        quantities: quantities_from_row(row)?,
        daily_amount: row.try_get("daily_amount")?,
        service_breakdown,
        is_calculated: row.try_get("is_calculated")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn invoice_from_row(row: &PgRow) -> Result<Invoice, DatabaseError> {
    Ok(Invoice {
        id: InvoiceId::new(row.try_get("id")?),
        invoice_number: row.try_get("invoice_number")?,
        bill_id: BillId::new(row.try_get("bill_id")?),
        customer_id: CustomerId::new(row.try_get("customer_id")?),
        invoice_format: text_column(row, "invoice_format")?,
        issue_date: row.try_get("issue_date")?,
        due_date: row.try_get("due_date")?,
        subtotal: row.try_get("subtotal")?,
        tax_amount: row.try_get("tax_amount")?,
        discount_amount: row.try_get("discount_amount")?,
        total_amount: row.try_get("total_amount")?,
        paid_amount: row.try_get("paid_amount")?,
        balance_due: row.try_get("balance_due")?,
        amount_in_words: row.try_get("amount_in_words")?,
        status: text_column(row, "status")?,
        notes: row.try_get("notes")?,
        issued_at: row.try_get("issued_at")?,
        paid_at: row.try_get("paid_at")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &PgRow) -> Result<InvoiceItem, DatabaseError> {
    let service_type = match row.try_get::<Option<String>, _>("service_type")? {
        Some(raw) => Some(parse_text::<ServiceComponent>("service_type", &raw)?),
        None => None,
    };
    Ok(InvoiceItem {
        id: InvoiceItemId::new(row.try_get("id")?),
        invoice_id: InvoiceId::new(row.try_get("invoice_id")?),
        serial_number: row.try_get("serial_number")?,
        service_name: row.try_get("service_name")?,
        service_type,
        description: row.try_get("description")?,
        unit: row.try_get("unit")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        amount: row.try_get("amount")?,
        line_total: row.try_get("line_total")?,
    })
}

fn master_from_row(row: &PgRow) -> Result<PaymentMaster, DatabaseError> {
    Ok(PaymentMaster {
        id: PaymentMasterId::new(row.try_get("id")?),
        entitlement_id: EntitlementId::new(row.try_get("entitlement_id")?),
        invoice_id: InvoiceId::new(row.try_get("invoice_id")?),
        payment_date: row.try_get("payment_date")?,
        payment_method: row.try_get("payment_method")?,
        remarks: row.try_get("remarks")?,
        received_by: row.try_get("received_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn detail_from_row(row: &PgRow) -> Result<PaymentDetails, DatabaseError> {
    Ok(PaymentDetails {
        id: PaymentDetailId::new(row.try_get("id")?),
        payment_master_id: PaymentMasterId::new(row.try_get("payment_master_id")?),
        pay_amount: row.try_get("pay_amount")?,
        transaction_id: row.try_get("transaction_id")?,
        status: text_column(row, "status")?,
        remarks: row.try_get("remarks")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// Customers
// ============================================================================

pub async fn find_customer(conn: &mut PgConnection, id: CustomerId) -> Result<Option<Customer>, DatabaseError> {
    sqlx::query(concat!("SELECT ", customer_columns!(), " FROM customers WHERE id = $1"))
        .bind(id.value())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| customer_from_row(&row))
        .transpose()
}

pub async fn customer_email_exists(conn: &mut PgConnection, email: &str) -> Result<bool, DatabaseError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM customers WHERE lower(email) = lower($1))",
    )
    .bind(email)
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

pub async fn insert_customer(
    conn: &mut PgConnection,
    new: &NewCustomer,
    created_by: &str,
) -> Result<Customer, DatabaseError> {
    let mut customer = Customer::from_new(CustomerId::default(), new.clone(), created_by, Utc::now());
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO customers (
            customer_number, name, email, phone, customer_type, category,
            is_active, created_by, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(customer.customer_number.as_deref())
    .bind(&customer.name)
    .bind(customer.email.as_deref())
    .bind(customer.phone.as_deref())
    .bind(customer.category.type_name())
    .bind(Json(&customer.category))
    .bind(customer.is_active)
    .bind(&customer.created_by)
    .bind(customer.created_at)
    .bind(customer.updated_at)
    .fetch_one(&mut *conn)
    .await?;
    customer.id = CustomerId::new(id);
    Ok(customer)
}

pub async fn update_customer(conn: &mut PgConnection, customer: &Customer) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE customers SET
            customer_number = $2, name = $3, email = $4, phone = $5,
            customer_type = $6, category = $7, is_active = $8, updated_at = $9
        WHERE id = $1
        "#,
    )
    .bind(customer.id.value())
    .bind(customer.customer_number.as_deref())
    .bind(&customer.name)
    .bind(customer.email.as_deref())
    .bind(customer.phone.as_deref())
    .bind(customer.category.type_name())
    .bind(Json(&customer.category))
    .bind(customer.is_active)
    .bind(customer.updated_at)
    .execute(&mut *conn)
    .await?;
    expect_row(result.rows_affected(), "Customer", customer.id)
}

// ============================================================================
// Bills
// ============================================================================

/// Loads a bill, optionally taking a row lock
pub async fn find_bill(conn: &mut PgConnection, id: BillId, for_update: bool) -> Result<Option<BillRecord>, DatabaseError> {
    let sql = if for_update {
        concat!("SELECT ", bill_columns!(), " FROM bill_records WHERE id = $1 FOR UPDATE")
    } else {
        concat!("SELECT ", bill_columns!(), " FROM bill_records WHERE id = $1")
    };
    sqlx::query(sql)
        .bind(id.value())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| bill_from_row(&row))
        .transpose()
}

pub async fn insert_bill(conn: &mut PgConnection, new: &NewBill, created_by: &str) -> Result<BillRecord, DatabaseError> {
    let mut bill = BillRecord::from_new(BillId::default(), new.clone(), created_by, Utc::now());
    let mut query = sqlx::query_scalar::<_, i64>(concat!(
        "INSERT INTO bill_records (customer_id, bill_number, billing_date, active_date, termination_date, ",
        usage_columns!(),
        ", discount, total_bill, total_received, total_due, status, remarks, created_by, updated_by, \
         created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
         $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27) RETURNING id"
    ))
    .bind(bill.customer_id.value())
    .bind(bill.bill_number.as_deref())
    .bind(bill.billing_date)
    .bind(bill.active_date)
    .bind(bill.termination_date);
    for (_, line) in bill.usage.iter() {
        query = query.bind(line.quantity).bind(line.price);
    }
    let id = query
        .bind(bill.discount)
        .bind(bill.total_bill)
        .bind(bill.total_received)
        .bind(bill.total_due)
        .bind(bill.status.as_str())
        .bind(bill.remarks.as_deref())
        .bind(&bill.created_by)
        .bind(bill.updated_by.as_deref())
        .bind(bill.created_at)
        .bind(bill.updated_at)
        .fetch_one(&mut *conn)
        .await?;
    bill.id = BillId::new(id);
    Ok(bill)
}

pub async fn update_bill(conn: &mut PgConnection, bill: &BillRecord) -> Result<(), DatabaseError> {
    let query = sqlx::query(
        r#"
        UPDATE bill_records SET
            bill_number = $2, billing_date = $3, active_date = $4, termination_date = $5,
            iig_qt = $6, iig_qt_price = $7, fna_qt = $8, fna_qt_price = $9,
            ggc_qt = $10, ggc_qt_price = $11, cdn_qt = $12, cdn_qt_price = $13,
            bdix_qt = $14, bdix_qt_price = $15, baishan_qt = $16, baishan_qt_price = $17,
            discount = $18, total_bill = $19, total_received = $20, total_due = $21,
            status = $22, remarks = $23, updated_by = $24, updated_at = $25
        WHERE id = $1
        "#,
    )
    .bind(bill.id.value())
    .bind(bill.bill_number.as_deref())
    .bind(bill.billing_date)
    .bind(bill.active_date)
    .bind(bill.termination_date);

    let result = bind_usage(query, &bill.usage)
        .bind(bill.discount)
        .bind(bill.total_bill)
        .bind(bill.total_received)
        .bind(bill.total_due)
        .bind(bill.status.as_str())
        .bind(bill.remarks.as_deref())
        .bind(bill.updated_by.as_deref())
        .bind(bill.updated_at)
        .execute(&mut *conn)
        .await?;
    expect_row(result.rows_affected(), "Bill", bill.id)
}

/// Deletes a bill; periods and daily rows cascade
pub async fn delete_bill(conn: &mut PgConnection, id: BillId) -> Result<bool, DatabaseError> {
    let result = sqlx::query("DELETE FROM bill_records WHERE id = $1")
        .bind(id.value())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Pricing periods
// ============================================================================

pub async fn list_periods(conn: &mut PgConnection, bill_id: BillId) -> Result<Vec<PricingPeriod>, DatabaseError> {
    sqlx::query(concat!(
        "SELECT ",
        period_columns!(),
        " FROM pricing_periods WHERE bill_id = $1 ORDER BY start_day, id"
    ))
    .bind(bill_id.value())
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(period_from_row)
    .collect()
}

pub async fn find_period(conn: &mut PgConnection, id: PricingPeriodId) -> Result<Option<PricingPeriod>, DatabaseError> {
    sqlx::query(concat!("SELECT ", period_columns!(), " FROM pricing_periods WHERE id = $1"))
        .bind(id.value())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| period_from_row(&row))
        .transpose()
}

pub async fn insert_period(
    conn: &mut PgConnection,
    bill_id: BillId,
    input: &PeriodInput,
) -> Result<PricingPeriod, DatabaseError> {
    let mut period = PricingPeriod::from_input(PricingPeriodId::default(), bill_id, input.clone(), Utc::now());
    let mut query = sqlx::query_scalar::<_, i64>(concat!(
        "INSERT INTO pricing_periods (bill_id, start_day, end_day, ",
        usage_columns!(),
        ", discount, notes, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
         $11, $12, $13, $14, $15, $16, $17, $18, $19) RETURNING id"
    ))
    .bind(bill_id.value())
    .bind(period.start_day)
    .bind(period.end_day);
    for (_, line) in period.usage.iter() {
        query = query.bind(line.quantity).bind(line.price);
    }
    let id = query
        .bind(period.discount)
        .bind(period.notes.as_deref())
        .bind(period.created_at)
        .bind(period.updated_at)
        .fetch_one(&mut *conn)
        .await?;
    period.id = PricingPeriodId::new(id);
    Ok(period)
}

pub async fn update_period(conn: &mut PgConnection, period: &PricingPeriod) -> Result<(), DatabaseError> {
    let query = sqlx::query(
        r#"
        UPDATE pricing_periods SET
            start_day = $2, end_day = $3,
            iig_qt = $4, iig_qt_price = $5, fna_qt = $6, fna_qt_price = $7,
            ggc_qt = $8, ggc_qt_price = $9, cdn_qt = $10, cdn_qt_price = $11,
            bdix_qt = $12, bdix_qt_price = $13, baishan_qt = $14, baishan_qt_price = $15,
            discount = $16, notes = $17, updated_at = $18
        WHERE id = $1
        "#,
    )
    .bind(period.id.value())
    .bind(period.start_day)
    .bind(period.end_day);

    let result = bind_usage(query, &period.usage)
        .bind(period.discount)
        .bind(period.notes.as_deref())
        .bind(period.updated_at)
        .execute(&mut *conn)
        .await?;
    expect_row(result.rows_affected(), "PricingPeriod", period.id)
}

/// Deletes a period; linked daily rows keep their data with a null link
pub async fn delete_period(conn: &mut PgConnection, id: PricingPeriodId) -> Result<bool, DatabaseError> {
    let result = sqlx::query("DELETE FROM pricing_periods WHERE id = $1")
        .bind(id.value())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Daily amounts
// ============================================================================

pub async fn list_daily_amounts(conn: &mut PgConnection, bill_id: BillId) -> Result<Vec<DailyBillAmount>, DatabaseError> {
    sqlx::query(concat!(
        "SELECT ",
        daily_columns!(),
        " FROM daily_bill_amounts WHERE bill_id = $1 ORDER BY date"
    ))
    .bind(bill_id.value())
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(daily_from_row)
    .collect()
}

pub async fn find_daily_amount(
    conn: &mut PgConnection,
    bill_id: BillId,
    date: NaiveDate,
) -> Result<Option<DailyBillAmount>, DatabaseError> {
    sqlx::query(concat!(
        "SELECT ",
        daily_columns!(),
        " FROM daily_bill_amounts WHERE bill_id = $1 AND date = $2"
    ))
    .bind(bill_id.value())
    .bind(date)
    .fetch_optional(&mut *conn)
    .await?
    .map(|row| daily_from_row(&row))
    .transpose()
}

pub async fn insert_daily_amount(conn: &mut PgConnection, new: &NewDailyAmount) -> Result<DailyBillAmount, DatabaseError> {
    let mut daily = new.clone().into_record(DailyBillAmountId::default(), Utc::now());
    let mut query = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO daily_bill_amounts (
            bill_id, date, pricing_period_id,
            iig_qt, fna_qt, ggc_qt, cdn_qt, bdix_qt, baishan_qt,
            daily_amount, service_breakdown, is_calculated, notes, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING id
        "#,
    )
    .bind(daily.bill_id.value())
    .bind(daily.date)
    .bind(daily.pricing_period_id.map(|id| id.value()));
    for (_, quantity) in daily.quantities.iter() {
        query = query.bind(*quantity);
    }
    let id = query
        .bind(daily.daily_amount)
        .bind(Json(&daily.service_breakdown))
        .bind(daily.is_calculated)
        .bind(daily.notes.as_deref())
        .bind(daily.created_at)
        .bind(daily.updated_at)
        .fetch_one(&mut *conn)
        .await?;
    daily.id = DailyBillAmountId::new(id);
    Ok(daily)
}

pub async fn update_daily_amount(conn: &mut PgConnection, daily: &DailyBillAmount) -> Result<(), DatabaseError> {
    let query = sqlx::query(
        r#"
        UPDATE daily_bill_amounts SET
            pricing_period_id = $2,
            iig_qt = $3, fna_qt = $4, ggc_qt = $5, cdn_qt = $6, bdix_qt = $7, baishan_qt = $8,
            daily_amount = $9, service_breakdown = $10, is_calculated = $11, notes = $12, updated_at = $13
        WHERE id = $1
        "#,
    )
    .bind(daily.id.value())
    .bind(daily.pricing_period_id.map(|id| id.value()));

    let result = bind_quantities(query, &daily.quantities)
        .bind(daily.daily_amount)
        .bind(Json(&daily.service_breakdown))
        .bind(daily.is_calculated)
        .bind(daily.notes.as_deref())
        .bind(daily.updated_at)
        .execute(&mut *conn)
        .await?;
    expect_row(result.rows_affected(), "DailyBillAmount", daily.id)
}

// ============================================================================
// Invoices
// ============================================================================

/// Serialises number assignment for one month prefix until commit
pub async fn lock_invoice_prefix(conn: &mut PgConnection, prefix: &str) -> Result<(), DatabaseError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(prefix)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn invoice_numbers_with_prefix(conn: &mut PgConnection, prefix: &str) -> Result<Vec<String>, DatabaseError> {
    let numbers = sqlx::query_scalar::<_, String>("SELECT invoice_number FROM invoices WHERE starts_with(invoice_number, $1)")
        .bind(prefix)
        .fetch_all(&mut *conn)
        .await?;
    Ok(numbers)
}

async fn load_items(conn: &mut PgConnection, invoice: &mut Invoice) -> Result<(), DatabaseError> {
    invoice.items = sqlx::query(concat!(
        "SELECT ",
        item_columns!(),
        " FROM invoice_items WHERE invoice_id = $1 ORDER BY serial_number, id"
    ))
    .bind(invoice.id.value())
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(item_from_row)
    .collect::<Result<_, _>>()?;
    Ok(())
}

/// Loads an invoice with its items, optionally locking the header row
pub async fn find_invoice(
    conn: &mut PgConnection,
    id: InvoiceId,
    for_update: bool,
) -> Result<Option<Invoice>, DatabaseError> {
    let sql = if for_update {
        concat!("SELECT ", invoice_columns!(), " FROM invoices WHERE id = $1 FOR UPDATE")
    } else {
        concat!("SELECT ", invoice_columns!(), " FROM invoices WHERE id = $1")
    };
    let row = sqlx::query(sql).bind(id.value()).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => {
            let mut invoice = invoice_from_row(&row)?;
            load_items(conn, &mut invoice).await?;
            Ok(Some(invoice))
        }
        None => Ok(None),
    }
}

pub async fn find_invoice_by_bill(conn: &mut PgConnection, bill_id: BillId) -> Result<Option<Invoice>, DatabaseError> {
    let row = sqlx::query(concat!("SELECT ", invoice_columns!(), " FROM invoices WHERE bill_id = $1"))
        .bind(bill_id.value())
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => {
            let mut invoice = invoice_from_row(&row)?;
            load_items(conn, &mut invoice).await?;
            Ok(Some(invoice))
        }
        None => Ok(None),
    }
}

/// Inserts the header and its items
pub async fn insert_invoice(
    conn: &mut PgConnection,
    new: &NewInvoice,
    created_by: &str,
) -> Result<Invoice, DatabaseError> {
    let placeholders = vec![InvoiceItemId::default(); new.items.len()];
    let mut invoice = new.clone().into_invoice(InvoiceId::default(), placeholders, created_by, Utc::now());

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO invoices (
            invoice_number, bill_id, customer_id, invoice_format, issue_date, due_date,
            subtotal, tax_amount, discount_amount, total_amount, paid_amount, balance_due,
            amount_in_words, status, notes, issued_at, paid_at, created_by, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
        RETURNING id
        "#,
    )
    .bind(&invoice.invoice_number)
    .bind(invoice.bill_id.value())
    .bind(invoice.customer_id.value())
    .bind(invoice.invoice_format.as_str())
    .bind(invoice.issue_date)
    .bind(invoice.due_date)
    .bind(invoice.subtotal)
    .bind(invoice.tax_amount)
    .bind(invoice.discount_amount)
    .bind(invoice.total_amount)
    .bind(invoice.paid_amount)
    .bind(invoice.balance_due)
    .bind(&invoice.amount_in_words)
    .bind(invoice.status.as_str())
    .bind(invoice.notes.as_deref())
    .bind(invoice.issued_at)
    .bind(invoice.paid_at)
    .bind(&invoice.created_by)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .fetch_one(&mut *conn)
    .await?;
    invoice.id = InvoiceId::new(id);

    for item in &mut invoice.items {
        item.invoice_id = invoice.id;
        let item_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_items (
                invoice_id, serial_number, service_name, service_type, description,
                unit, quantity, unit_price, amount, line_total
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(item.invoice_id.value())
        .bind(item.serial_number)
        .bind(&item.service_name)
        .bind(item.service_type.map(|c| c.key()))
        .bind(&item.description)
        .bind(&item.unit)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.amount)
        .bind(item.line_total)
        .fetch_one(&mut *conn)
        .await?;
        item.id = InvoiceItemId::new(item_id);
    }
    Ok(invoice)
}

/// Writes header fields only
pub async fn update_invoice(conn: &mut PgConnection, invoice: &Invoice) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE invoices SET
            issue_date = $2, due_date = $3, subtotal = $4, tax_amount = $5,
            discount_amount = $6, total_amount = $7, paid_amount = $8, balance_due = $9,
            amount_in_words = $10, status = $11, notes = $12, issued_at = $13,
            paid_at = $14, updated_at = $15
        WHERE id = $1
        "#,
    )
    .bind(invoice.id.value())
    .bind(invoice.issue_date)
    .bind(invoice.due_date)
    .bind(invoice.subtotal)
    .bind(invoice.tax_amount)
    .bind(invoice.discount_amount)
    .bind(invoice.total_amount)
    .bind(invoice.paid_amount)
    .bind(invoice.balance_due)
    .bind(&invoice.amount_in_words)
    .bind(invoice.status.as_str())
    .bind(invoice.notes.as_deref())
    .bind(invoice.issued_at)
    .bind(invoice.paid_at)
    .bind(invoice.updated_at)
    .execute(&mut *conn)
    .await?;
    expect_row(result.rows_affected(), "Invoice", invoice.id)
}

// ============================================================================
// Payments
// ============================================================================

pub async fn insert_payment_master(
    conn: &mut PgConnection,
    payment: &NewPayment,
    received_by: &str,
) -> Result<PaymentMaster, DatabaseError> {
    let mut master = payment.to_master(PaymentMasterId::default(), received_by, Utc::now());
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO payment_masters (
            entitlement_id, invoice_id, payment_date, payment_method, remarks,
            received_by, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(master.entitlement_id.value())
    .bind(master.invoice_id.value())
    .bind(master.payment_date)
    .bind(master.payment_method.as_deref())
    .bind(master.remarks.as_deref())
    .bind(&master.received_by)
    .bind(master.created_at)
    .bind(master.updated_at)
    .fetch_one(&mut *conn)
    .await?;
    master.id = PaymentMasterId::new(id);
    Ok(master)
}

pub async fn find_payment_master(conn: &mut PgConnection, id: PaymentMasterId) -> Result<Option<PaymentMaster>, DatabaseError> {
    sqlx::query(concat!("SELECT ", master_columns!(), " FROM payment_masters WHERE id = $1"))
        .bind(id.value())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| master_from_row(&row))
        .transpose()
}

pub async fn insert_payment_detail(
    conn: &mut PgConnection,
    master_id: PaymentMasterId,
    input: &PaymentDetailInput,
) -> Result<PaymentDetails, DatabaseError> {
    let mut detail = PaymentDetails::from_input(PaymentDetailId::default(), master_id, input.clone(), Utc::now());
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO payment_details (
            payment_master_id, pay_amount, transaction_id, status, remarks, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(master_id.value())
    .bind(detail.pay_amount)
    .bind(detail.transaction_id.as_deref())
    .bind(detail.status.as_str())
    .bind(detail.remarks.as_deref())
    .bind(detail.created_at)
    .bind(detail.updated_at)
    .fetch_one(&mut *conn)
    .await?;
    detail.id = PaymentDetailId::new(id);
    Ok(detail)
}

pub async fn find_payment_detail(conn: &mut PgConnection, id: PaymentDetailId) -> Result<Option<PaymentDetails>, DatabaseError> {
    sqlx::query(concat!("SELECT ", detail_columns!(), " FROM payment_details WHERE id = $1"))
        .bind(id.value())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| detail_from_row(&row))
        .transpose()
}

pub async fn update_payment_detail(conn: &mut PgConnection, detail: &PaymentDetails) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE payment_details SET
            pay_amount = $2, transaction_id = $3, status = $4, remarks = $5, updated_at = $6
        WHERE id = $1
        "#,
    )
    .bind(detail.id.value())
    .bind(detail.pay_amount)
    .bind(detail.transaction_id.as_deref())
    .bind(detail.status.as_str())
    .bind(detail.remarks.as_deref())
    .bind(detail.updated_at)
    .execute(&mut *conn)
    .await?;
    expect_row(result.rows_affected(), "PaymentDetails", detail.id)
}

pub async fn list_payment_details(
    conn: &mut PgConnection,
    master_id: PaymentMasterId,
) -> Result<Vec<PaymentDetails>, DatabaseError> {
    sqlx::query(concat!(
        "SELECT ",
        detail_columns!(),
        " FROM payment_details WHERE payment_master_id = $1 ORDER BY id"
    ))
    .bind(master_id.value())
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(detail_from_row)
    .collect()
}

/// Σ pay_amount over all details of all payments against an invoice
pub async fn sum_payments_for_invoice(conn: &mut PgConnection, invoice_id: InvoiceId) -> Result<Decimal, DatabaseError> {
    let total = sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(d.pay_amount), 0)
        FROM payment_details d
        JOIN payment_masters m ON m.id = d.payment_master_id
        WHERE m.invoice_id = $1
        "#,
    )
    .bind(invoice_id.value())
    .fetch_one(&mut *conn)
    .await?;
    Ok(total)
}

fn expect_row(rows_affected: u64, entity: &str, id: impl Display) -> Result<(), DatabaseError> {
    if rows_affected == 0 {
        return Err(DatabaseError::NotFound(format!("{} {}", entity, id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_billing::{BillStatus, InvoiceFormat, InvoiceStatus, PaymentDetailStatus};

    #[test]
    fn test_usage_columns_follow_component_order() {
        let columns: Vec<&str> = usage_columns!().split(", ").map(str::trim).collect();
        let expected: Vec<String> = ServiceComponent::ALL
            .iter()
            .flat_map(|c| [format!("{}_qt", c.key()), format!("{}_qt_price", c.key())])
            .collect();
        assert_eq!(columns, expected);
    }

    #[test]
    fn test_bill_columns_include_usage() {
        let columns = bill_columns!();
        assert!(columns.starts_with("id, customer_id"));
        assert!(columns.contains("baishan_qt_price, discount"));
    }

    #[test]
    fn test_parse_status_columns() {
        assert_eq!(parse_text::<InvoiceStatus>("status", "partial").unwrap(), InvoiceStatus::PartiallyPaid);
        assert_eq!(parse_text::<InvoiceFormat>("invoice_format", "INT").unwrap(), InvoiceFormat::Int);
        assert_eq!(parse_text::<BillStatus>("status", "inactive").unwrap(), BillStatus::Inactive);
        assert_eq!(
            parse_text::<PaymentDetailStatus>("status", "completed").unwrap(),
            PaymentDetailStatus::Completed
        );
        assert_eq!(parse_text::<ServiceComponent>("service_type", "bdix").unwrap(), ServiceComponent::Bdix);
    }

    #[test]
    fn test_unknown_text_is_corrupt() {
        let err = parse_text::<InvoiceStatus>("status", "archived").unwrap_err();
        assert!(matches!(err, DatabaseError::CorruptValue { ref column, .. } if column == "status"));
    }

    #[test]
    fn test_expect_row() {
        assert!(expect_row(1, "Bill", 3).is_ok());
        assert!(matches!(expect_row(0, "Bill", 3), Err(DatabaseError::NotFound(_))));
    }
}
