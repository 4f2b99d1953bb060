use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage, SimpleQueryRow};
use ulid::Ulid;

use yogabook::notify::NotifyHub;
use yogabook::store::Store;
use yogabook::wire::{self, StudioFactory};

const ADMIN_PASSWORD: &str = "secret";
const PUBLIC_PASSWORD: &str = "namaste";

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("yogabook_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let store = Arc::new(Store::open(dir.join("studio.wal"), Arc::new(NotifyHub::new())).unwrap());
    let factory = Arc::new(StudioFactory::new(
        store,
        ADMIN_PASSWORD.to_string(),
        PUBLIC_PASSWORD.to_string(),
    ));

    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let factory = factory.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, factory, None).await;
            });
        }
    });

    addr
}

async fn connect_as(addr: SocketAddr, user: &str, password: &str) -> Result<Client, tokio_postgres::Error> {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname("studio")
        .user(user)
        .password(password);

    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
        let _ = connection.await;
    });
    Ok(client)
}

async fn admin(addr: SocketAddr) -> Client {
    connect_as(addr, "admin", ADMIN_PASSWORD).await.unwrap()
}

async fn public(addr: SocketAddr) -> Client {
    connect_as(addr, "web", PUBLIC_PASSWORD).await.unwrap()
}

async fn rows(client: &Client, sql: &str) -> Vec<SimpleQueryRow> {
    client
        .simple_query(sql)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

async fn sqlstate(client: &Client, sql: &str) -> String {
    let err = client.simple_query(sql).await.unwrap_err();
    err.code().map(|c| c.code().to_string()).unwrap_or_default()
}

async fn create_wednesday_class(client: &Client, capacity: u32, reserved: u32) -> Ulid {
    let id = Ulid::new();
    client
        .simple_query(&format!(
            "INSERT INTO recurring_rules (id, title, day_of_week, time_start, time_end, capacity, reserved_spots, price) \
             VALUES ('{id}', 'Vinyasa Flow', 3, '17:00', '18:30', {capacity}, {reserved}, 2500)"
        ))
        .await
        .unwrap();
    id
}

fn book_sql(kind: &str, unit_id: &str, email: &str) -> String {
    format!(
        "INSERT INTO registrations (kind, unit_id, name, email) VALUES ('{kind}', '{unit_id}', 'Ada Lovelace', '{email}')"
    )
}

const MARCH: &str = "SELECT * FROM schedule WHERE date >= '2025-03-01' AND date <= '2025-03-31'";

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn wrong_password_is_refused() {
    let addr = start_test_server().await;
    assert!(connect_as(addr, "admin", PUBLIC_PASSWORD).await.is_err());
    assert!(connect_as(addr, "web", "nope").await.is_err());
}

#[tokio::test]
async fn schedule_lists_every_wednesday() {
    let addr = start_test_server().await;
    let admin = admin(addr).await;
    let rule_id = create_wednesday_class(&admin, 10, 2).await;

    let public = public(addr).await;
    let schedule = rows(&public, MARCH).await;
    let dates: Vec<&str> = schedule.iter().map(|r| r.get("date").unwrap()).collect();
    assert_eq!(dates, ["2025-03-05", "2025-03-12", "2025-03-19", "2025-03-26"]);
    for row in &schedule {
        assert_eq!(row.get("kind"), Some("recurring"));
        assert_eq!(row.get("source_id"), Some(rule_id.to_string().as_str()));
        assert_eq!(row.get("time_start"), Some("17:00"));
        assert_eq!(row.get("capacity"), Some("10"));
        assert_eq!(row.get("registered_count"), Some("2"));
        assert_eq!(row.get("remaining_spots"), Some("8"));
    }

    // the second read reuses the instances created by the first
    let again = rows(&public, MARCH).await;
    let ids: Vec<_> = schedule.iter().map(|r| r.get("unit_id").unwrap().to_string()).collect();
    let ids_again: Vec<_> = again.iter().map(|r| r.get("unit_id").unwrap().to_string()).collect();
    assert_eq!(ids, ids_again);
}

#[tokio::test]
async fn booking_until_full() {
    let addr = start_test_server().await;
    let admin = admin(addr).await;
    create_wednesday_class(&admin, 3, 1).await;

    let public = public(addr).await;
    let schedule = rows(&public, MARCH).await;
    let unit_id = schedule[0].get("unit_id").unwrap().to_string();

    public
        .simple_query(&book_sql("recurring", &unit_id, "ada@example.com"))
        .await
        .unwrap();
    public
        .simple_query(&book_sql("recurring", &unit_id, "grace@example.com"))
        .await
        .unwrap();
    assert_eq!(
        sqlstate(&public, &book_sql("recurring", &unit_id, "alan@example.com")).await,
        "23514"
    );

    let schedule = rows(&public, MARCH).await;
    assert_eq!(schedule[0].get("registered_count"), Some("3"));
    assert_eq!(schedule[0].get("full"), Some("t"));
    assert_eq!(schedule[1].get("registered_count"), Some("1"));

    let registrations = rows(
        &admin,
        &format!("SELECT * FROM registrations WHERE kind = 'recurring' AND unit_id = '{unit_id}'"),
    )
    .await;
    assert_eq!(registrations.len(), 2);
    assert_eq!(registrations[0].get("email"), Some("ada@example.com"));
}

#[tokio::test]
async fn cancelled_occurrence_disappears_and_refuses_bookings() {
    let addr = start_test_server().await;
    let admin = admin(addr).await;
    let rule_id = create_wednesday_class(&admin, 10, 0).await;

    let public = public(addr).await;
    let schedule = rows(&public, MARCH).await;
    let unit_id = schedule[1].get("unit_id").unwrap().to_string();

    admin
        .simple_query(&format!(
            "UPDATE instances SET cancelled = NOT cancelled WHERE rule_id = '{rule_id}' AND date = '2025-03-12'"
        ))
        .await
        .unwrap();

    let schedule = rows(&public, MARCH).await;
    let dates: Vec<&str> = schedule.iter().map(|r| r.get("date").unwrap()).collect();
    assert_eq!(dates, ["2025-03-05", "2025-03-19", "2025-03-26"]);
    assert_eq!(
        sqlstate(&public, &book_sql("recurring", &unit_id, "ada@example.com")).await,
        "55000"
    );

    let instances = rows(&admin, &format!("SELECT * FROM instances WHERE rule_id = '{rule_id}'")).await;
    assert_eq!(instances.len(), 4);
    let cancelled: Vec<_> = instances
        .iter()
        .filter(|r| r.get("cancelled") == Some("t"))
        .map(|r| r.get("date").unwrap())
        .collect();
    assert_eq!(cancelled, ["2025-03-12"]);
}

#[tokio::test]
async fn workshops_and_filters() {
    let addr = start_test_server().await;
    let admin = admin(addr).await;
    create_wednesday_class(&admin, 10, 0).await;
    admin
        .simple_query(
            "INSERT INTO workshops (title, date, time_start, time_end, capacity, price) \
             VALUES ('Arm Balances', '2025-03-08', '10:00', '13:00', 20, 6000)",
        )
        .await
        .unwrap();

    let public = public(addr).await;
    let all = rows(&public, MARCH).await;
    assert_eq!(all.len(), 5);
    let workshops = rows(&public, &format!("{MARCH} AND kind = 'workshop'")).await;
    assert_eq!(workshops.len(), 1);
    assert_eq!(workshops[0].get("title"), Some("Arm Balances"));
    assert_eq!(workshops[0].get("date"), Some("2025-03-08"));
    let singles = rows(&public, &format!("{MARCH} AND kind IN ('one_time', 'workshop')")).await;
    assert_eq!(singles.len(), 1);
    let both = rows(&public, &format!("{MARCH} AND kind IN ('recurring', 'workshop')")).await;
    assert_eq!(both.len(), 5);

    let unit_id = workshops[0].get("unit_id").unwrap().to_string();
    public
        .simple_query(&book_sql("workshop", &unit_id, "ada@example.com"))
        .await
        .unwrap();
    let workshops = rows(&public, &format!("{MARCH} AND kind = 'workshop'")).await;
    assert_eq!(workshops[0].get("remaining_spots"), Some("19"));
}

#[tokio::test]
async fn public_login_cannot_administer() {
    let addr = start_test_server().await;
    let admin = admin(addr).await;
    let rule_id = create_wednesday_class(&admin, 10, 0).await;

    let public = public(addr).await;
    assert_eq!(
        sqlstate(&public, &format!("DELETE FROM recurring_rules WHERE id = '{rule_id}'")).await,
        "42501"
    );
    assert_eq!(sqlstate(&public, "SELECT * FROM messages").await, "42501");
    assert_eq!(rows(&public, "SELECT * FROM recurring_rules").await.len(), 1);
}

#[tokio::test]
async fn invalid_fields_are_reported() {
    let addr = start_test_server().await;
    let admin = admin(addr).await;
    create_wednesday_class(&admin, 10, 0).await;

    let public = public(addr).await;
    let schedule = rows(&public, MARCH).await;
    let unit_id = schedule[0].get("unit_id").unwrap().to_string();

    assert_eq!(
        sqlstate(&public, &book_sql("recurring", &unit_id, "not-an-email")).await,
        "22023"
    );
    assert_eq!(
        sqlstate(&public, &book_sql("recurring", &Ulid::new().to_string(), "ada@example.com")).await,
        "P0002"
    );
    assert_eq!(
        sqlstate(&public, "SELECT * FROM schedule WHERE date >= '2025-03-01'").await,
        "42601"
    );
}

#[tokio::test]
async fn contact_messages_round_trip() {
    let addr = start_test_server().await;
    let public = public(addr).await;
    public
        .simple_query(
            "INSERT INTO messages (name, email, body) VALUES ('Ada', 'ada@example.com', 'Do you offer prenatal yoga?')",
        )
        .await
        .unwrap();
    assert_eq!(
        sqlstate(&public, "INSERT INTO messages (name, email, body) VALUES ('Ada', 'ada@example.com', '')").await,
        "22023"
    );

    let admin = admin(addr).await;
    let messages = rows(&admin, "SELECT * FROM messages").await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].get("read"), Some("f"));
    let id = messages[0].get("id").unwrap().to_string();

    admin
        .simple_query(&format!("UPDATE messages SET read = true WHERE id = '{id}'"))
        .await
        .unwrap();
    assert_eq!(rows(&admin, "SELECT * FROM messages").await[0].get("read"), Some("t"));

    admin
        .simple_query(&format!("DELETE FROM messages WHERE id = '{id}'"))
        .await
        .unwrap();
    assert!(rows(&admin, "SELECT * FROM messages").await.is_empty());
}

#[tokio::test]
async fn extended_protocol_with_parameters() {
    let addr = start_test_server().await;
    let admin = admin(addr).await;
    create_wednesday_class(&admin, 10, 2).await;

    let public = public(addr).await;
    let schedule = public
        .query(
            "SELECT * FROM schedule WHERE date >= $1 AND date <= $2",
            &[&"2025-03-01", &"2025-03-09"],
        )
        .await
        .unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].get::<_, String>("date"), "2025-03-05");
    assert_eq!(schedule[0].get::<_, i64>("remaining_spots"), 8);
    assert_eq!(schedule[0].get::<_, Option<String>>("note"), None);
}
