//! Canonical EXPLAIN fixtures shared by the integration tests
//!
//! `ORDERS_REPORT_TEXT` and `ORDERS_REPORT_JSON` describe the same execution
//! of the same statement.

#![allow(dead_code)]

use pgexplain_analyzer::PlanNode;

pub const ORDERS_REPORT_TEXT: &str = "\
                                                                   QUERY PLAN
------------------------------------------------------------------------------------------------------------------------------------------------
 Sort  (cost=2450.12..2475.12 rows=10000 width=48) (actual time=95.000..98.500 rows=9800 loops=1)
   Sort Key: o.created_at DESC
   Sort Method: external merge  Disk: 2048kB
   Buffers: shared hit=120 read=880
   ->  Hash Join  (cost=350.00..1650.00 rows=10000 width=48) (actual time=12.000..80.000 rows=9800 loops=1)
         Hash Cond: (o.user_id = u.id)
         ->  Seq Scan on orders o  (cost=0.00..1100.00 rows=50000 width=24) (actual time=0.010..40.000 rows=50000 loops=1)
               Filter: (status = 'shipped'::text)
               Rows Removed by Filter: 20000
         ->  Hash  (cost=225.00..225.00 rows=150 width=28) (actual time=11.500..11.500 rows=2000 loops=1)
               Buckets: 16384  Batches: 1  Memory Usage: 150kB
               ->  Index Scan using users_active_idx on users u  (cost=0.29..225.00 rows=150 width=28) (actual time=0.020..10.000 rows=2000 loops=1)
                     Index Cond: (active = true)
 Planning Time: 0.420 ms
 Execution Time: 100.000 ms
(15 rows)";

pub const ORDERS_REPORT_JSON: &str = r#"[
  {
    "Plan": {
      "Node Type": "Sort",
      "Startup Cost": 2450.12,
      "Total Cost": 2475.12,
      "Plan Rows": 10000,
      "Plan Width": 48,
      "Actual Startup Time": 95.0,
      "Actual Total Time": 98.5,
      "Actual Rows": 9800,
      "Actual Loops": 1,
      "Sort Key": ["o.created_at DESC"],
      "Sort Method": "external merge",
      "Sort Space Used": 2048,
      "Sort Space Type": "Disk",
      "Shared Hit Blocks": 120,
      "Shared Read Blocks": 880,
      "Plans": [
        {
          "Node Type": "Hash Join",
          "Parent Relationship": "Outer",
          "Join Type": "Inner",
          "Startup Cost": 350.0,
          "Total Cost": 1650.0,
          "Plan Rows": 10000,
          "Plan Width": 48,
          "Actual Startup Time": 12.0,
          "Actual Total Time": 80.0,
          "Actual Rows": 9800,
          "Actual Loops": 1,
          "Hash Cond": "(o.user_id = u.id)",
          "Plans": [
            {
              "Node Type": "Seq Scan",
              "Parent Relationship": "Outer",
              "Relation Name": "orders",
              "Alias": "o",
              "Startup Cost": 0.0,
              "Total Cost": 1100.0,
              "Plan Rows": 50000,
              "Plan Width": 24,
              "Actual Startup Time": 0.01,
              "Actual Total Time": 40.0,
              "Actual Rows": 50000,
              "Actual Loops": 1,
              "Filter": "(status = 'shipped'::text)",
              "Rows Removed by Filter": 20000
            },
            {
              "Node Type": "Hash",
              "Parent Relationship": "Inner",
              "Startup Cost": 225.0,
              "Total Cost": 225.0,
              "Plan Rows": 150,
              "Plan Width": 28,
              "Actual Startup Time": 11.5,
              "Actual Total Time": 11.5,
              "Actual Rows": 2000,
              "Actual Loops": 1,
              "Plans": [
                {
                  "Node Type": "Index Scan",
                  "Parent Relationship": "Outer",
                  "Scan Direction": "Forward",
                  "Index Name": "users_active_idx",
                  "Relation Name": "users",
                  "Alias": "u",
                  "Startup Cost": 0.29,
                  "Total Cost": 225.0,
                  "Plan Rows": 150,
                  "Plan Width": 28,
                  "Actual Startup Time": 0.02,
                  "Actual Total Time": 10.0,
                  "Actual Rows": 2000,
                  "Actual Loops": 1,
                  "Index Cond": "(active = true)"
                }
              ]
            }
          ]
        }
      ]
    },
    "Planning Time": 0.42,
    "Triggers": [],
    "Execution Time": 100.0
  }
]"#;

/// A large filtered Seq Scan taking almost all of the execution time
pub const USERS_BY_EMAIL_JSON: &str = r#"[
  {
    "Plan": {
      "Node Type": "Seq Scan",
      "Relation Name": "users",
      "Alias": "users",
      "Startup Cost": 0.0,
      "Total Cost": 1234.0,
      "Plan Rows": 1,
      "Plan Width": 64,
      "Actual Startup Time": 0.02,
      "Actual Total Time": 120.5,
      "Actual Rows": 52000,
      "Actual Loops": 1,
      "Filter": "(email = 'test@example.com'::text)",
      "Rows Removed by Filter": 948000
    },
    "Planning Time": 0.15,
    "Execution Time": 125.0
  }
]"#;

/// A primary-key lookup with nothing to improve
pub const PRIMARY_KEY_LOOKUP_TEXT: &str = "\
Index Scan using users_pkey on users  (cost=0.29..8.31 rows=1 width=64) (actual time=0.015..0.030 rows=1 loops=1)
  Index Cond: (id = 42)
Planning Time: 0.080 ms
Execution Time: 0.050 ms";

/// Node types in pre-order
pub fn node_types(root: &PlanNode) -> Vec<&str> {
    root.iter().map(|node| node.node_type.as_str()).collect()
}
