//! Procedure element and group repository.
//!
//! # Responsibility
//! - CRUD for `Procedure_Element` rows.
//! - Read and replace whole bundle, custom and sequence groups.
//!
//! # Invariants
//! - Groups are written as a unit: replacing a group deletes every row of
//!   that `GroupID` and inserts the new rows in one immediate transaction.
//! - Group reads return rows in display order (`ID` for bundle and custom,
//!   `Step_Num` for sequences).

use super::{bool_to_int, parse_release, RepoError, RepoResult};
use crate::db::ensure_catalog_ready;
use crate::model::{
    BundleItem, CustomItem, ProcedureClass, ProcedureElement, SequenceStep, StepTarget,
};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

pub(crate) const ELEMENT_SELECT_SQL: &str = "SELECT
    ID, Release, Class_Major, Class_Sub, Class_Detail, Class_Type, Name, Description,
    Position_Type, Cost_Time, Plan_State, Plan_Count, Plan_Interval,
    Consum_1_ID, Consum_1_Count, Procedure_Level, Procedure_Cost, Price
FROM Procedure_Element";

const BUNDLE_SELECT_SQL: &str = "SELECT
    ID, GroupID, Release, Name, Description, Element_ID, Element_Cost, Price_Ratio
FROM Procedure_Bundle";

const CUSTOM_SELECT_SQL: &str = "SELECT
    ID, GroupID, Release, Name, Description, Element_ID, Custom_Count, Element_Limit,
    Element_Cost, Price_Ratio
FROM Procedure_Custom";

const SEQUENCE_SELECT_SQL: &str = "SELECT
    ID, GroupID, Release, Step_Num, Element_ID, Bundle_ID, Custom_ID,
    Sequence_Interval, Procedure_Cost, Price_Ratio
FROM Procedure_Sequence";

pub trait ProcedureRepository {
    fn get_element(&self, id: i64) -> RepoResult<Option<ProcedureElement>>;
    fn list_elements(&self, active_only: bool) -> RepoResult<Vec<ProcedureElement>>;
    fn upsert_element(&self, element: &ProcedureElement) -> RepoResult<()>;

    fn get_bundle(&self, group_id: i64) -> RepoResult<Vec<BundleItem>>;
    fn replace_bundle(&self, items: &[BundleItem]) -> RepoResult<()>;

    fn get_custom(&self, group_id: i64) -> RepoResult<Vec<CustomItem>>;
    fn replace_custom(&self, items: &[CustomItem]) -> RepoResult<()>;

    fn get_sequence(&self, group_id: i64) -> RepoResult<Vec<SequenceStep>>;
    fn replace_sequence(&self, steps: &[SequenceStep]) -> RepoResult<()>;

    fn list_classes(&self, group_id: Option<i64>) -> RepoResult<Vec<ProcedureClass>>;
}

pub struct SqliteProcedureRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProcedureRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_catalog_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ProcedureRepository for SqliteProcedureRepository<'_> {
    fn get_element(&self, id: i64) -> RepoResult<Option<ProcedureElement>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ELEMENT_SELECT_SQL} WHERE ID = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_element_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_elements(&self, active_only: bool) -> RepoResult<Vec<ProcedureElement>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ELEMENT_SELECT_SQL} WHERE (?1 = 0 OR Release = 1) ORDER BY ID ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(active_only)])?;
        let mut elements = Vec::new();
        while let Some(row) = rows.next()? {
            elements.push(parse_element_row(row)?);
        }
        Ok(elements)
    }

    fn upsert_element(&self, element: &ProcedureElement) -> RepoResult<()> {
        element.validate()?;
        self.conn.execute(
            "INSERT INTO Procedure_Element (
                ID, Release, Class_Major, Class_Sub, Class_Detail, Class_Type, Name, Description,
                Position_Type, Cost_Time, Plan_State, Plan_Count, Plan_Interval,
                Consum_1_ID, Consum_1_Count, Procedure_Level, Procedure_Cost, Price
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT (ID) DO UPDATE SET
                Release = excluded.Release,
                Class_Major = excluded.Class_Major,
                Class_Sub = excluded.Class_Sub,
                Class_Detail = excluded.Class_Detail,
                Class_Type = excluded.Class_Type,
                Name = excluded.Name,
                Description = excluded.Description,
                Position_Type = excluded.Position_Type,
                Cost_Time = excluded.Cost_Time,
                Plan_State = excluded.Plan_State,
                Plan_Count = excluded.Plan_Count,
                Plan_Interval = excluded.Plan_Interval,
                Consum_1_ID = excluded.Consum_1_ID,
                Consum_1_Count = excluded.Consum_1_Count,
                Procedure_Level = excluded.Procedure_Level,
                Procedure_Cost = excluded.Procedure_Cost,
                Price = excluded.Price;",
            params![
                element.id,
                bool_to_int(element.release),
                element.class_major.as_deref(),
                element.class_sub.as_deref(),
                element.class_detail.as_deref(),
                element.class_type.as_deref(),
                element.name.trim(),
                element.description.as_deref(),
                element.position_type.as_deref(),
                element.cost_time,
                element.plan_state,
                element.plan_count,
                element.plan_interval,
                element.consum_1_id,
                element.consum_1_count,
                element.procedure_level.as_deref(),
                element.procedure_cost,
                element.price,
            ],
        )?;
        Ok(())
    }

    fn get_bundle(&self, group_id: i64) -> RepoResult<Vec<BundleItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BUNDLE_SELECT_SQL} WHERE GroupID = ?1 ORDER BY ID ASC;"))?;
        let mut rows = stmt.query([group_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(BundleItem {
                id: row.get("ID")?,
                group_id: row.get("GroupID")?,
                release: parse_release(row, "Procedure_Bundle")?,
                name: row.get("Name")?,
                description: row.get("Description")?,
                element_id: row.get("Element_ID")?,
                element_cost: row.get("Element_Cost")?,
                price_ratio: row.get("Price_Ratio")?,
            });
        }
        Ok(items)
    }

    fn replace_bundle(&self, items: &[BundleItem]) -> RepoResult<()> {
        let group_id = BundleItem::validate_group(items)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM Procedure_Bundle WHERE GroupID = ?1;", [group_id])?;
        for item in items {
            tx.execute(
                "INSERT INTO Procedure_Bundle (
                    ID, GroupID, Release, Name, Description, Element_ID, Element_Cost, Price_Ratio
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    item.id,
                    item.group_id,
                    bool_to_int(item.release),
                    item.name.as_deref(),
                    item.description.as_deref(),
                    item.element_id,
                    item.element_cost,
                    item.price_ratio,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_custom(&self, group_id: i64) -> RepoResult<Vec<CustomItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CUSTOM_SELECT_SQL} WHERE GroupID = ?1 ORDER BY ID ASC;"))?;
        let mut rows = stmt.query([group_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(CustomItem {
                id: row.get("ID")?,
                group_id: row.get("GroupID")?,
                release: parse_release(row, "Procedure_Custom")?,
                name: row.get("Name")?,
                description: row.get("Description")?,
                element_id: row.get("Element_ID")?,
                custom_count: row.get("Custom_Count")?,
                element_limit: row.get("Element_Limit")?,
                element_cost: row.get("Element_Cost")?,
                price_ratio: row.get("Price_Ratio")?,
            });
        }
        Ok(items)
    }

    fn replace_custom(&self, items: &[CustomItem]) -> RepoResult<()> {
        let group_id = CustomItem::validate_group(items)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM Procedure_Custom WHERE GroupID = ?1;", [group_id])?;
        for item in items {
            tx.execute(
                "INSERT INTO Procedure_Custom (
                    ID, GroupID, Release, Name, Description, Element_ID, Custom_Count,
                    Element_Limit, Element_Cost, Price_Ratio
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
                params![
                    item.id,
                    item.group_id,
                    bool_to_int(item.release),
                    item.name.as_deref(),
                    item.description.as_deref(),
                    item.element_id,
                    item.custom_count,
                    item.element_limit,
                    item.element_cost,
                    item.price_ratio,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_sequence(&self, group_id: i64) -> RepoResult<Vec<SequenceStep>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SEQUENCE_SELECT_SQL} WHERE GroupID = ?1 ORDER BY Step_Num ASC, ID ASC;"
        ))?;
        let mut rows = stmt.query([group_id])?;
        let mut steps = Vec::new();
        while let Some(row) = rows.next()? {
            steps.push(parse_sequence_row(row)?);
        }
        Ok(steps)
    }

    fn replace_sequence(&self, steps: &[SequenceStep]) -> RepoResult<()> {
        let group_id = SequenceStep::validate_group(steps)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM Procedure_Sequence WHERE GroupID = ?1;", [group_id])?;
        for step in steps {
            let (element_id, bundle_id, custom_id) = step.target.columns();
            tx.execute(
                "INSERT INTO Procedure_Sequence (
                    ID, GroupID, Release, Step_Num, Element_ID, Bundle_ID, Custom_ID,
                    Sequence_Interval, Procedure_Cost, Price_Ratio
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
                params![
                    step.id,
                    step.group_id,
                    bool_to_int(step.release),
                    step.step_num,
                    element_id,
                    bundle_id,
                    custom_id,
                    step.sequence_interval,
                    step.procedure_cost,
                    step.price_ratio,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_classes(&self, group_id: Option<i64>) -> RepoResult<Vec<ProcedureClass>> {
        let mut stmt = self.conn.prepare(
            "SELECT GroupID, ID, Release, Class_Major, Class_Sub, Class_Detail, Class_Type
             FROM Procedure_Class
             WHERE ?1 IS NULL OR GroupID = ?1
             ORDER BY GroupID ASC, ID ASC;",
        )?;
        let mut rows = stmt.query([group_id])?;
        let mut classes = Vec::new();
        while let Some(row) = rows.next()? {
            classes.push(ProcedureClass {
                group_id: row.get("GroupID")?,
                id: row.get("ID")?,
                release: parse_release(row, "Procedure_Class")?,
                class_major: row.get("Class_Major")?,
                class_sub: row.get("Class_Sub")?,
                class_detail: row.get("Class_Detail")?,
                class_type: row.get("Class_Type")?,
            });
        }
        Ok(classes)
    }
}

pub(crate) fn parse_element_row(row: &Row<'_>) -> RepoResult<ProcedureElement> {
    Ok(ProcedureElement {
        id: row.get("ID")?,
        release: parse_release(row, "Procedure_Element")?,
        class_major: row.get("Class_Major")?,
        class_sub: row.get("Class_Sub")?,
        class_detail: row.get("Class_Detail")?,
        class_type: row.get("Class_Type")?,
        name: row.get("Name")?,
        description: row.get("Description")?,
        position_type: row.get("Position_Type")?,
        cost_time: row.get("Cost_Time")?,
        plan_state: row.get("Plan_State")?,
        plan_count: row.get("Plan_Count")?,
        plan_interval: row.get("Plan_Interval")?,
        consum_1_id: row.get("Consum_1_ID")?,
        consum_1_count: row.get("Consum_1_Count")?,
        procedure_level: row.get("Procedure_Level")?,
        procedure_cost: row.get("Procedure_Cost")?,
        price: row.get("Price")?,
    })
}

fn parse_sequence_row(row: &Row<'_>) -> RepoResult<SequenceStep> {
    let id: i64 = row.get("ID")?;
    let target = StepTarget::from_columns(
        row.get("Element_ID")?,
        row.get("Bundle_ID")?,
        row.get("Custom_ID")?,
    )
    .ok_or_else(|| {
        RepoError::InvalidData(format!(
            "Procedure_Sequence row {id} must reference exactly one target"
        ))
    })?;

    Ok(SequenceStep {
        id,
        group_id: row.get("GroupID")?,
        release: parse_release(row, "Procedure_Sequence")?,
        step_num: row.get("Step_Num")?,
        target,
        sequence_interval: row.get("Sequence_Interval")?,
        procedure_cost: row.get("Procedure_Cost")?,
        price_ratio: row.get("Price_Ratio")?,
    })
}
