use std::sync::{Arc, Mutex};

use mhi_sl4::{
    Error, Event, HvacMode, LocalApi, ModeField, SystemController, VirtualGroupSpec,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn group(no: &str, name: &str, inlet: &str, set: &str) -> Value {
    json!({
        "GroupNo": no, "GroupName": name, "Drive": "1", "Mode": "1",
        "InletTemp": inlet, "SetTemp": set, "FanSpeed": "2",
        "AirDirection": "0", "FilterSign": "0", "RcProhibition": "0"
    })
}

fn group_body(groups: Value) -> Value {
    json!({
        "GetResGroupData": {
            "FloorData": [
                { "FloorNo": "1", "GroupData": groups }
            ]
        }
    })
}

fn command_ack(no: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "SetResChangeGroup": { "GroupNo": no } }))
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login.asp"))
        .respond_with(ResponseTemplate::new(302).insert_header("Set-Cookie", "sessionId=abc123"))
        .mount(server)
        .await;
}

async fn mount_fetch(server: &MockServer, groups: Value) {
    Mock::given(method("POST"))
        .and(path("/json/group_list_json.asp"))
        .and(body_string_contains("GetReqGroupData"))
        .respond_with(ResponseTemplate::new(200).set_body_json(group_body(groups)))
        .mount(server)
        .await;
}

fn wildcard(key: &str) -> VirtualGroupSpec {
    VirtualGroupSpec {
        key: key.to_string(),
        display_name: "All units".to_string(),
        members: None,
    }
}

fn explicit(key: &str, members: &[&str]) -> VirtualGroupSpec {
    VirtualGroupSpec {
        key: key.to_string(),
        display_name: key.to_string(),
        members: Some(members.iter().map(|s| s.to_string()).collect()),
    }
}

fn controller(server: &MockServer, spec: VirtualGroupSpec) -> SystemController<LocalApi> {
    let addr = server.address();
    let api = LocalApi::builder(format!("{}:{}", addr.ip(), addr.port()), "admin", "secret").build();
    SystemController::builder(api).group(spec).build()
}

#[tokio::test]
async fn refresh_exposes_physical_and_virtual_devices() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_fetch(
        &server,
        json!([group("01", "Lobby", "21.0", "24.0"), group("02", "Office", "23.0", "24.0")]),
    )
    .await;

    let mut controller = controller(&server, wildcard("all"));
    controller.refresh().await.expect("refresh should succeed");

    let states = controller.device_states();
    assert_eq!(states.len(), 3, "two physical plus one virtual");
    assert_eq!(states[0].key, "01");
    assert_eq!(states[1].key, "02");

    let all = &states[2];
    assert!(all.is_virtual);
    assert_eq!(all.member_ids, ["01", "02"]);
    assert_eq!(all.current_temperature.unwrap().celsius(), 22.0);
    assert_eq!(all.hvac_mode, Some(HvacMode::Cool));
    assert!(all.is_consistent);
}

#[tokio::test]
async fn refresh_fires_discovery_events() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_fetch(&server, json!([group("01", "Lobby", "21.0", "24.0")])).await;

    let events: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(vec![]));
    let events_clone = events.clone();

    let addr = server.address();
    let api = LocalApi::builder(format!("{}:{}", addr.ip(), addr.port()), "admin", "secret").build();
    let mut controller = SystemController::builder(api)
        .on_event(move |event| events_clone.lock().unwrap().push(event.clone()))
        .build();
    controller.refresh().await.unwrap();

    let captured = events.lock().unwrap();
    assert!(captured.contains(&Event::UnitDiscovered {
        id: "01".to_string(),
        name: "Lobby".to_string(),
    }));
}

#[tokio::test]
async fn setpoint_round_trip_through_virtual_group() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_fetch(
        &server,
        json!([group("01", "Lobby", "21.0", "24.0"), group("02", "Office", "23.0", "24.0")]),
    )
    .await;
    for no in ["01", "02"] {
        Mock::given(method("POST"))
            .and(path("/json/group_list_json.asp"))
            .and(body_string_contains("SetReqChangeGroup"))
            .and(body_string_contains(format!(r#""GroupNo":"{no}""#)))
            .and(body_string_contains(r#""SetTemp":"20.0""#))
            .respond_with(command_ack(no))
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut controller = controller(&server, wildcard("all"));
    controller.refresh().await.unwrap();

    let outcome = controller
        .set_target_temperature("all", 20.0)
        .await
        .expect("dispatch should succeed");
    assert!(outcome.is_success());

    // Optimistic update: visible before the next poll cycle.
    let all = controller.device("all").unwrap();
    assert_eq!(all.target_temperature.unwrap().celsius(), 20.0);
    assert!(all.is_consistent);
}

#[tokio::test]
async fn partial_failure_lists_failed_member_and_keeps_its_state() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_fetch(
        &server,
        json!([
            group("01", "North", "21.0", "24.0"),
            group("02", "Middle", "22.0", "24.0"),
            group("03", "South", "23.0", "24.0")
        ]),
    )
    .await;
    // Member 02 is refused by the controller; the siblings succeed.
    Mock::given(method("POST"))
        .and(path("/json/group_list_json.asp"))
        .and(body_string_contains(r#""GroupNo":"02""#))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "ErrorData": { "ErrorNo": "3" } })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/json/group_list_json.asp"))
        .and(body_string_contains("SetReqChangeGroup"))
        .respond_with(command_ack("xx"))
        .expect(2)
        .mount(&server)
        .await;

    let mut controller = controller(&server, explicit("floor", &["01", "02", "03"]));
    controller.refresh().await.unwrap();

    let outcome = controller
        .set_target_temperature("floor", 20.0)
        .await
        .unwrap();
    let failed: Vec<&str> = outcome.failures().iter().map(|f| f.unit_id.as_str()).collect();
    assert_eq!(failed, ["02"], "exactly the refused member is reported");
    assert!(matches!(outcome.failures()[0].error, Error::Rejected { .. }));

    let target_of = |key: &str| {
        controller
            .device(key)
            .unwrap()
            .target_temperature
            .unwrap()
            .celsius()
    };
    assert_eq!(target_of("01"), 20.0);
    assert_eq!(target_of("02"), 24.0, "failed member keeps prior state");
    assert_eq!(target_of("03"), 20.0);

    let floor = controller.device("floor").unwrap();
    assert!(!floor.is_consistent, "divergence is observable on the aggregate");
    assert_eq!(floor.target_temperature.unwrap().celsius(), 20.0);
}

#[tokio::test]
async fn out_of_range_setpoint_sends_nothing() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_fetch(&server, json!([group("01", "Lobby", "21.0", "24.0")])).await;
    Mock::given(method("POST"))
        .and(path("/json/group_list_json.asp"))
        .and(body_string_contains("SetReqChangeGroup"))
        .respond_with(command_ack("01"))
        .expect(0)
        .mount(&server)
        .await;

    let mut controller = controller(&server, wildcard("all"));
    controller.refresh().await.unwrap();

    let err = controller.set_target_temperature("all", 31.0).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRange(v) if v == 31.0));
}

#[tokio::test]
async fn unsupported_mode_sends_nothing() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_fetch(&server, json!([group("01", "Lobby", "21.0", "24.0")])).await;
    Mock::given(method("POST"))
        .and(path("/json/group_list_json.asp"))
        .and(body_string_contains("SetReqChangeGroup"))
        .respond_with(command_ack("01"))
        .expect(0)
        .mount(&server)
        .await;

    let mut controller = controller(&server, wildcard("all"));
    controller.refresh().await.unwrap();

    let err = controller
        .set_mode("01", ModeField::Hvac, "turbo")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedMode { .. }));
}

#[tokio::test]
async fn set_mode_fans_out_and_updates_members() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_fetch(
        &server,
        json!([group("01", "Lobby", "21.0", "24.0"), group("02", "Office", "23.0", "24.0")]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/json/group_list_json.asp"))
        .and(body_string_contains("SetReqChangeGroup"))
        .and(body_string_contains(r#""Drive":"0""#))
        .respond_with(command_ack("xx"))
        .expect(2)
        .mount(&server)
        .await;

    let mut controller = controller(&server, wildcard("all"));
    controller.refresh().await.unwrap();

    let outcome = controller
        .set_mode("all", ModeField::Hvac, "off")
        .await
        .unwrap();
    assert!(outcome.is_success());

    let all = controller.device("all").unwrap();
    assert_eq!(all.hvac_mode, Some(HvacMode::Off));
    assert_eq!(controller.device("01").unwrap().hvac_mode, Some(HvacMode::Off));
}

#[tokio::test]
async fn wildcard_group_with_no_units_is_all_absent() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_fetch(&server, json!([])).await;

    let mut controller = controller(&server, wildcard("all"));
    controller.refresh().await.unwrap();

    let all = controller.device("all").expect("virtual device exists");
    assert!(all.member_ids.is_empty());
    assert_eq!(all.current_temperature, None);
    assert_eq!(all.hvac_mode, None);
    assert_eq!(all.filter_signaled, None);
    assert_eq!(all.remote_locked, None);
    assert!(all.is_consistent);
}

#[tokio::test]
async fn failed_refresh_keeps_last_good_snapshot() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/json/group_list_json.asp"))
        .and(body_string_contains("GetReqGroupData"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(group_body(json!([group("01", "Lobby", "21.0", "24.0")]))),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/json/group_list_json.asp"))
        .and(body_string_contains("GetReqGroupData"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let mut controller = controller(&server, wildcard("all"));
    controller.refresh().await.unwrap();
    assert_eq!(controller.registry().len(), 1);

    let err = controller.refresh().await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(controller.registry().len(), 1, "registry is untouched");
    assert!(!controller.registry().get("01").unwrap().stale);
}

#[tokio::test]
async fn units_missing_from_a_fetch_stay_in_virtual_groups() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/json/group_list_json.asp"))
        .and(body_string_contains("GetReqGroupData"))
        .respond_with(ResponseTemplate::new(200).set_body_json(group_body(json!([
            group("01", "Lobby", "21.0", "24.0"),
            group("02", "Office", "23.0", "24.0")
        ]))))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/json/group_list_json.asp"))
        .and(body_string_contains("GetReqGroupData"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(group_body(json!([group("01", "Lobby", "21.0", "24.0")]))),
        )
        .mount(&server)
        .await;

    let mut controller = controller(&server, wildcard("all"));
    controller.refresh().await.unwrap();
    controller.refresh().await.unwrap();

    assert!(controller.registry().get("02").unwrap().stale);
    let all = controller.device("all").unwrap();
    assert_eq!(all.member_ids, ["01", "02"], "stale member is retained");
}

#[tokio::test]
async fn unknown_device_key_is_an_error() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_fetch(&server, json!([])).await;

    let mut controller = controller(&server, wildcard("all"));
    controller.refresh().await.unwrap();

    let err = controller.set_target_temperature("nope", 22.0).await.unwrap_err();
    assert!(matches!(err, Error::UnknownDevice(ref key) if key == "nope"));
}
