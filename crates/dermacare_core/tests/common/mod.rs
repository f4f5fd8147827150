#![allow(dead_code)]

use dermacare_core::db::open_db_in_memory;
use dermacare_core::import::Sheet;
use rusqlite::Connection;
use serde_json::{json, Value};

/// A small priced catalog.
///
/// Rates: doctor 1000/min, aesthetician 500/min.
/// After `recalculate_all`:
/// - consumable 1: unit 11000, VAT 1000; consumable 2: unit 25000, VAT 0
/// - element 1: 32000, element 2 (plan x5): 50000, element 3: 40000,
///   element 4 is inactive
/// - bundle 1: 82000, custom 1: 72000, sequence 1: 50000 + 82000
pub const SEED_SQL: &str = "
UPDATE Global SET Doc_Price_Minute = 1000, Aesthetician_Price_Minute = 500 WHERE ID = 1;

INSERT INTO Consumables (ID, Release, Name, Unit_Type, I_Value, F_Value, Price, Taxable_Type) VALUES
    (1, 1, '보톡스 바이알', '바이알', 10, NULL, 110000, '과세'),
    (2, 1, '필러 시린지', 'cc', -1, 2.0, 50000, '면세');

INSERT INTO Procedure_Element (
    ID, Release, Class_Major, Class_Sub, Class_Detail, Class_Type, Name, Description,
    Position_Type, Cost_Time, Plan_State, Plan_Count, Consum_1_ID, Consum_1_Count
) VALUES
    (1, 1, '주사', '보톡스', '사각턱', '보톡스', '사각턱 보톡스', '턱 근육 축소', '의사', 10, NULL, NULL, 1, 2),
    (2, 1, '레이저', '토닝', '피코토닝', '레이저', '피코 토닝', '색소 개선', '관리사', 20, 1, 5, NULL, NULL),
    (3, 1, '주사', '필러', '코필러', '필러', '코 필러', NULL, '의사', 15, NULL, NULL, 2, NULL),
    (4, 0, '레이저', '제모', '겨드랑이', '레이저', '겨드랑이 제모', NULL, '관리사', 10, NULL, NULL, NULL, NULL);

INSERT INTO Procedure_Bundle (ID, GroupID, Release, Name, Description, Element_ID) VALUES
    (1, 1, 1, '보톡스 토닝 패키지', '보톡스와 토닝을 함께', 1),
    (2, 1, 1, '보톡스 토닝 패키지', NULL, 2);

INSERT INTO Procedure_Custom (ID, GroupID, Release, Name, Element_ID, Custom_Count, Element_Limit) VALUES
    (1, 1, 1, '자유 선택 주사', 1, 2, 1),
    (2, 1, 1, '자유 선택 주사', 3, 2, 1);

INSERT INTO Procedure_Sequence (ID, GroupID, Release, Step_Num, Element_ID, Bundle_ID, Sequence_Interval) VALUES
    (1, 1, 1, 1, 2, NULL, 14),
    (2, 1, 1, 2, NULL, 1, 28);

INSERT INTO Info_Standard (ID, Release, Product_Standard_Name, Product_Standard_Description, Precautions) VALUES
    (1, 1, '사각턱 보톡스 상품', '턱선 정리', '시술 후 마사지 금지');
INSERT INTO Info_Event (ID, Release, Event_Name, Event_Description) VALUES
    (1, 1, '여름 이벤트', '여름 한정');
INSERT INTO Info_Membership (ID, Release, Membership_Name) VALUES
    (1, 1, 'VIP 멤버십');

INSERT INTO Product_Standard (ID, Release, Package_Type, Element_ID, Bundle_ID, Sequence_ID, Standard_Info_ID, Sell_Price, Standard_Start_Date) VALUES
    (1, 1, '단일시술', 1, NULL, NULL, 1, 50000, '2024-01-01'),
    (2, 1, '번들', NULL, 1, NULL, NULL, 100000, '2024-03-01'),
    (3, 1, '시퀀스', NULL, NULL, 1, NULL, 200000, NULL);

INSERT INTO Product_Event (ID, Release, Package_Type, Element_ID, Custom_ID, Event_Info_ID, Sell_Price, Original_Price, Discount_Rate, Event_Start_Date) VALUES
    (1, 1, '커스텀', NULL, 1, 1, 72000, 80000, 10, '2024-06-01'),
    (2, 1, '단일시술', 3, NULL, NULL, 60000, NULL, NULL, '2024-07-01');

INSERT INTO Membership (ID, Release, Membership_Info_ID, Payment_Amount, Bonus_Point) VALUES
    (1, 1, 1, 1000000, 100000);
";

pub fn empty_catalog() -> Connection {
    open_db_in_memory().unwrap()
}

pub fn seeded_catalog() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(SEED_SQL).unwrap();
    conn
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}

pub fn scalar_i64(conn: &Connection, sql: &str) -> Option<i64> {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

/// Builds a generic-layout sheet: description, use flag, type and name rows,
/// then `rows`.
pub fn generic_sheet(name: &str, columns: &[(&str, &str)], rows: Vec<Vec<Value>>) -> Sheet {
    let mut grid: Vec<Value> = vec![
        Value::Array(columns.iter().map(|(column, _)| json!(format!("{column} 설명"))).collect()),
        Value::Array(columns.iter().map(|_| json!(1)).collect()),
        Value::Array(columns.iter().map(|(_, declared)| json!(declared)).collect()),
        Value::Array(columns.iter().map(|(column, _)| json!(column)).collect()),
    ];
    grid.extend(rows.into_iter().map(Value::Array));
    Sheet::from_json_str(name, &Value::Array(grid).to_string()).unwrap()
}
