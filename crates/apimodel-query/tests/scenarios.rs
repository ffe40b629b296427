use std::cell::RefCell;
use std::sync::Arc;

use apimodel_query::builder::{Condition, WhereNode};
use apimodel_query::parser::{BooleanOp, NestMethod, SortDirection};
use apimodel_query::{
    ExecutionError, Operator, PreparedQuery, QueryEngine, QueryExecutor, QueryMethod,
    QueryOutcome, RawQuery, RequestValidator, ResourceSchema, Row, SchemaRegistry, SqlRenderer,
};
use serde_json::json;

fn users() -> ResourceSchema {
    ResourceSchema::new("users", "users")
        .with_allowed_attributes(["age", "created_at", "id", "name"])
        .with_restricted_attributes(["secret"])
        .with_eager_load("posts", "posts", ["title", "body"])
        .with_allowed_methods(["get", "avg", "count", "exists"])
}

fn engine() -> QueryEngine {
    let registry = SchemaRegistry::from_schemas([users()]).expect("valid schema");
    QueryEngine::new(Arc::new(registry))
}

#[test]
fn filter_sort_fields_and_include_pass() {
    let query = engine()
        .prepare(
            "users",
            Some("GET"),
            "filter[0:age:gte]=18&sort=-created_at&fields=id,name&include=posts:title",
        )
        .expect("query should pass validation");

    assert_eq!(
        query.conditions(),
        vec![&Condition::Basic {
            column: "age".into(),
            operator: Operator::Ge,
            value: "18".into(),
        }]
    );
    assert_eq!(query.orders.len(), 1);
    assert_eq!(query.orders[0].column, "created_at");
    assert_eq!(query.orders[0].direction, SortDirection::Desc);
    assert_eq!(query.select.len(), 2);
    assert_eq!(query.eager_loads.len(), 1);
    assert_eq!(query.eager_loads[0].relation, "posts");
    assert_eq!(query.eager_loads[0].columns, vec!["title"]);
}

#[test]
fn restricted_filter_column_is_reported() {
    let errors = RequestValidator::new(&users())
        .validate(&RawQuery::parse("filter[0:secret:eq]=1"))
        .unwrap_err();

    assert_eq!(errors.len(), 1);
    let message = errors.messages()["filter"][0].clone();
    assert!(message.contains("secret"), "unexpected message: {message}");
}

#[test]
fn aggregate_argument_must_be_allowed() {
    let errors = RequestValidator::new(&users())
        .validate(&RawQuery::parse("queryType=avg:price"))
        .unwrap_err();

    let violation = errors.get("queryType").expect("queryType violation");
    assert_eq!(violation.value, "price");
    assert_eq!(
        violation.message(),
        "Invalid queryType or queryType attribute: price"
    );

    let ok = RequestValidator::new(&users())
        .validate(&RawQuery::parse("queryType=avg:age"))
        .expect("avg over an allowed attribute");
    assert_eq!(ok.query_type.args, vec!["age"]);
}

#[test]
fn filters_must_reference_declared_nest_groups() {
    let errors = RequestValidator::new(&users())
        .validate(&RawQuery::parse("nested=and&filter[1:age:gte]=18"))
        .unwrap_err();
    assert!(errors.get("filter").is_some());

    let errors = RequestValidator::new(&users())
        .validate(&RawQuery::parse("nested=and,2:or"))
        .unwrap_err();
    assert!(errors.get("nested").is_some());
}

#[test]
fn exists_group_becomes_subquery() {
    let query = engine()
        .prepare(
            "users",
            None,
            "nested=and,0:and:e&filter[name:e]=ann&filter[1:posts.title:e]=hello",
        )
        .expect("exists over an eager-loaded table");

    assert_eq!(query.wheres.len(), 2);
    let WhereNode::Group {
        method,
        subquery_table,
        ..
    } = &query.wheres[1]
    else {
        panic!("expected exists group, got {:?}", query.wheres[1]);
    };
    assert_eq!(*method, Some(NestMethod::Exists));
    assert_eq!(subquery_table.as_deref(), Some("posts"));

    let sql = SqlRenderer::new().render(&query).expect("render");
    assert!(sql.sql.contains(
        "WHERE \"name\" = $1 AND EXISTS (SELECT 1 FROM \"posts\" WHERE \"posts\".\"title\" = $2)"
    ));
    assert_eq!(sql.params, vec!["ann", "hello"]);
}

#[test]
fn nested_or_group_renders_in_parentheses() {
    let built = engine()
        .render_sql(
            "users",
            None,
            "nested=and,0:or&filter[id:e]=1&filter[1:age:lt]=18&filter[1:or:age:gt]=65",
        )
        .expect("render");
    assert!(
        built
            .sql
            .ends_with("WHERE \"id\" = $1 AND (\"age\" < $2 OR \"age\" > $3)"),
        "unexpected sql: {}",
        built.sql
    );
}

struct RecordingExecutor {
    outcome: QueryOutcome,
    calls: RefCell<Vec<PreparedQuery>>,
}

impl QueryExecutor for RecordingExecutor {
    fn execute(&self, query: &PreparedQuery) -> Result<QueryOutcome, ExecutionError> {
        self.calls.borrow_mut().push(query.clone());
        Ok(self.outcome.clone())
    }
}

#[test]
fn execution_wraps_results() {
    let engine = engine();

    let aggregate = RecordingExecutor {
        outcome: QueryOutcome::Scalar(json!(42.0)),
        calls: RefCell::new(Vec::new()),
    };
    let value = engine
        .run("users", None, "queryType=avg:age&filter[age:gte]=18", &aggregate)
        .expect("avg");
    assert_eq!(value, json!([{ "aggregate": 42.0 }]));
    let calls = aggregate.calls.borrow();
    assert_eq!(calls[0].method, QueryMethod::Avg("age".into()));
    assert_eq!(calls[0].wheres[0].boolean(), BooleanOp::And);

    let rows = RecordingExecutor {
        outcome: QueryOutcome::Rows(vec![
            Row::default()
                .with_attribute("id", 7)
                .with_appended("display_name", "Ann"),
        ]),
        calls: RefCell::new(Vec::new()),
    };
    let value = engine.run("users", None, "fields=id", &rows).expect("get");
    assert_eq!(value, json!([{ "id": 7 }]));

    let exists = RecordingExecutor {
        outcome: QueryOutcome::Exists(false),
        calls: RefCell::new(Vec::new()),
    };
    let value = engine
        .run("users", None, "queryType=exists&filter[name:e]=zed", &exists)
        .expect("exists");
    assert_eq!(value, json!([{ "exists": false }]));
}

#[test]
fn delete_requires_permission() {
    let err = engine().prepare("users", Some("DELETE"), "queryType=delete").unwrap_err();
    assert_eq!(err.status_code(), 422);
}

#[test]
fn malformed_identifiers_are_rejected_before_rendering() {
    let err = engine()
        .render_sql("users", None, "fields=id+as+a-b")
        .unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(err.status_code(), 422);

    let open = ResourceSchema::new("events", "events").with_all_attributes();
    let registry = SchemaRegistry::from_schemas([open]).expect("valid schema");
    let engine = QueryEngine::new(Arc::new(registry));
    for query in ["sort=-", "filter[na%22me:e]=1", "groupBy=a-b"] {
        let err = engine.render_sql("events", None, query).unwrap_err();
        assert_eq!(err.status_code(), 422, "{query}");
    }
    assert!(engine.render_sql("events", None, "sort=-kind").is_ok());
}

#[test]
fn scopes_validate_but_are_not_rendered() {
    let schema = users().with_allowed_scopes(["popular"]);
    let registry = SchemaRegistry::from_schemas([schema]).expect("valid schema");
    let engine = QueryEngine::new(Arc::new(registry));

    assert!(engine.prepare("users", None, "filter[popular:scope]=").is_ok());
    let err = engine
        .render_sql("users", None, "filter[popular:scope]=")
        .unwrap_err();
    assert_eq!(err.status_code(), 501);
    assert_eq!(err.category(), apimodel_query::ErrorCategory::UnsupportedOperation);
}
