//! Product and membership repository.
//!
//! # Invariants
//! - Rows are read back through `PackageRef::from_columns`; a row whose
//!   discriminator disagrees with its id columns is `InvalidData`.
//! - Products always carry a package, memberships may not.

use super::{bool_to_int, parse_release, RepoError, RepoResult};
use crate::db::ensure_catalog_ready;
use crate::model::{Membership, PackageRef, Product, ProductKind};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const MEMBERSHIP_SELECT_SQL: &str = "SELECT
    ID, Release, Membership_Info_ID, Payment_Amount, Bonus_Point, Credit, Discount_Rate,
    Package_Type, Element_ID, Bundle_ID, Custom_ID, Sequence_ID,
    Validity_Period, Release_Start_Date, Release_End_Date
FROM Membership";

pub trait ProductRepository {
    fn get_product(&self, kind: ProductKind, id: i64) -> RepoResult<Option<Product>>;
    fn list_products(&self, kind: ProductKind, active_only: bool) -> RepoResult<Vec<Product>>;
    /// Products of `kind` selling `package`, ordered by `ID`.
    fn list_by_package(&self, kind: ProductKind, package: PackageRef) -> RepoResult<Vec<Product>>;
    fn upsert_product(&self, product: &Product) -> RepoResult<()>;

    fn get_membership(&self, id: i64) -> RepoResult<Option<Membership>>;
    fn list_memberships(&self, active_only: bool) -> RepoResult<Vec<Membership>>;
    fn upsert_membership(&self, membership: &Membership) -> RepoResult<()>;
}

pub struct SqliteProductRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProductRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_catalog_ready(conn)?;
        Ok(Self { conn })
    }

    fn query_products(
        &self,
        kind: ProductKind,
        filter: &str,
        bind_values: Vec<Value>,
    ) -> RepoResult<Vec<Product>> {
        let sql = format!("{} {filter} ORDER BY ID ASC;", product_select_sql(kind));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut products = Vec::new();
        while let Some(row) = rows.next()? {
            products.push(parse_product_row(row, kind)?);
        }
        Ok(products)
    }
}

impl ProductRepository for SqliteProductRepository<'_> {
    fn get_product(&self, kind: ProductKind, id: i64) -> RepoResult<Option<Product>> {
        let mut products = self.query_products(kind, "WHERE ID = ?", vec![Value::Integer(id)])?;
        Ok(products.pop())
    }

    fn list_products(&self, kind: ProductKind, active_only: bool) -> RepoResult<Vec<Product>> {
        let filter = if active_only { "WHERE Release = 1" } else { "" };
        self.query_products(kind, filter, Vec::new())
    }

    fn list_by_package(&self, kind: ProductKind, package: PackageRef) -> RepoResult<Vec<Product>> {
        let filter = format!(
            "WHERE Package_Type = ? AND {} = ?",
            package.package_type().id_column()
        );
        self.query_products(
            kind,
            &filter,
            vec![
                Value::Text(package.package_type().label().to_string()),
                Value::Integer(package.target_id()),
            ],
        )
    }

    fn upsert_product(&self, product: &Product) -> RepoResult<()> {
        product.validate()?;
        let kind = product.kind;
        let columns = product.package.columns();
        let sql = format!(
            "INSERT INTO {table} (
                ID, Release, Package_Type, Element_ID, Bundle_ID, Custom_ID, Sequence_ID,
                {info}, Procedure_Cost, Sell_Price, Discount_Rate, Original_Price, Margin,
                Margin_Rate, {start}, {end}, Validity_Period, VAT, Covered_Type, Taxable_Type
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            ON CONFLICT (ID) DO UPDATE SET
                Release = excluded.Release,
                Package_Type = excluded.Package_Type,
                Element_ID = excluded.Element_ID,
                Bundle_ID = excluded.Bundle_ID,
                Custom_ID = excluded.Custom_ID,
                Sequence_ID = excluded.Sequence_ID,
                {info} = excluded.{info},
                Procedure_Cost = excluded.Procedure_Cost,
                Sell_Price = excluded.Sell_Price,
                Discount_Rate = excluded.Discount_Rate,
                Original_Price = excluded.Original_Price,
                Margin = excluded.Margin,
                Margin_Rate = excluded.Margin_Rate,
                {start} = excluded.{start},
                {end} = excluded.{end},
                Validity_Period = excluded.Validity_Period,
                VAT = excluded.VAT,
                Covered_Type = excluded.Covered_Type,
                Taxable_Type = excluded.Taxable_Type;",
            table = kind.table(),
            info = kind.info_column(),
            start = kind.start_date_column(),
            end = kind.end_date_column(),
        );
        self.conn.execute(
            &sql,
            params![
                product.id,
                bool_to_int(product.release),
                columns.package_type,
                columns.element_id,
                columns.bundle_id,
                columns.custom_id,
                columns.sequence_id,
                product.info_id,
                product.procedure_cost,
                product.sell_price,
                product.discount_rate,
                product.original_price,
                product.margin,
                product.margin_rate,
                product.start_date.as_deref(),
                product.end_date.as_deref(),
                product.validity_period,
                product.vat,
                product.covered_type.as_deref(),
                product.taxable_type.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn get_membership(&self, id: i64) -> RepoResult<Option<Membership>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEMBERSHIP_SELECT_SQL} WHERE ID = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_membership_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_memberships(&self, active_only: bool) -> RepoResult<Vec<Membership>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBERSHIP_SELECT_SQL} WHERE (?1 = 0 OR Release = 1) ORDER BY ID ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(active_only)])?;
        let mut memberships = Vec::new();
        while let Some(row) = rows.next()? {
            memberships.push(parse_membership_row(row)?);
        }
        Ok(memberships)
    }

    fn upsert_membership(&self, membership: &Membership) -> RepoResult<()> {
        membership.validate()?;
        let columns = membership
            .package
            .map(PackageRef::columns)
            .unwrap_or_default();
        self.conn.execute(
            "INSERT INTO Membership (
                ID, Release, Membership_Info_ID, Payment_Amount, Bonus_Point, Credit,
                Discount_Rate, Package_Type, Element_ID, Bundle_ID, Custom_ID, Sequence_ID,
                Validity_Period, Release_Start_Date, Release_End_Date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT (ID) DO UPDATE SET
                Release = excluded.Release,
                Membership_Info_ID = excluded.Membership_Info_ID,
                Payment_Amount = excluded.Payment_Amount,
                Bonus_Point = excluded.Bonus_Point,
                Credit = excluded.Credit,
                Discount_Rate = excluded.Discount_Rate,
                Package_Type = excluded.Package_Type,
                Element_ID = excluded.Element_ID,
                Bundle_ID = excluded.Bundle_ID,
                Custom_ID = excluded.Custom_ID,
                Sequence_ID = excluded.Sequence_ID,
                Validity_Period = excluded.Validity_Period,
                Release_Start_Date = excluded.Release_Start_Date,
                Release_End_Date = excluded.Release_End_Date;",
            params![
                membership.id,
                bool_to_int(membership.release),
                membership.info_id,
                membership.payment_amount,
                membership.bonus_point,
                membership.credit,
                membership.discount_rate,
                columns.package_type,
                columns.element_id,
                columns.bundle_id,
                columns.custom_id,
                columns.sequence_id,
                membership.validity_period,
                membership.release_start_date.as_deref(),
                membership.release_end_date.as_deref(),
            ],
        )?;
        Ok(())
    }
}

fn product_select_sql(kind: ProductKind) -> String {
    format!(
        "SELECT
            ID, Release, Package_Type, Element_ID, Bundle_ID, Custom_ID, Sequence_ID,
            {} AS Info_ID, Procedure_Cost, Sell_Price, Discount_Rate, Original_Price, Margin,
            Margin_Rate, {} AS Start_Date, {} AS End_Date, Validity_Period, VAT,
            Covered_Type, Taxable_Type
         FROM {}",
        kind.info_column(),
        kind.start_date_column(),
        kind.end_date_column(),
        kind.table()
    )
}

fn parse_package(row: &Row<'_>, table: &str, id: i64) -> RepoResult<Option<PackageRef>> {
    let package_type: Option<String> = row.get("Package_Type")?;
    PackageRef::from_columns(
        package_type.as_deref(),
        row.get("Element_ID")?,
        row.get("Bundle_ID")?,
        row.get("Custom_ID")?,
        row.get("Sequence_ID")?,
    )
    .map_err(|err| RepoError::InvalidData(format!("{table} row {id}: {err}")))
}

fn parse_product_row(row: &Row<'_>, kind: ProductKind) -> RepoResult<Product> {
    let id: i64 = row.get("ID")?;
    let package = parse_package(row, kind.table(), id)?.ok_or_else(|| {
        RepoError::InvalidData(format!("{} row {id} has no package", kind.table()))
    })?;

    Ok(Product {
        kind,
        id,
        release: parse_release(row, kind.table())?,
        package,
        info_id: row.get("Info_ID")?,
        procedure_cost: row.get("Procedure_Cost")?,
        sell_price: row.get("Sell_Price")?,
        discount_rate: row.get("Discount_Rate")?,
        original_price: row.get("Original_Price")?,
        margin: row.get("Margin")?,
        margin_rate: row.get("Margin_Rate")?,
        start_date: row.get("Start_Date")?,
        end_date: row.get("End_Date")?,
        validity_period: row.get("Validity_Period")?,
        vat: row.get("VAT")?,
        covered_type: row.get("Covered_Type")?,
        taxable_type: row.get("Taxable_Type")?,
    })
}

fn parse_membership_row(row: &Row<'_>) -> RepoResult<Membership> {
    let id: i64 = row.get("ID")?;
    Ok(Membership {
        id,
        release: parse_release(row, "Membership")?,
        info_id: row.get("Membership_Info_ID")?,
        payment_amount: row.get("Payment_Amount")?,
        bonus_point: row.get("Bonus_Point")?,
        credit: row.get("Credit")?,
        discount_rate: row.get("Discount_Rate")?,
        package: parse_package(row, "Membership", id)?,
        validity_period: row.get("Validity_Period")?,
        release_start_date: row.get("Release_Start_Date")?,
        release_end_date: row.get("Release_End_Date")?,
    })
}
