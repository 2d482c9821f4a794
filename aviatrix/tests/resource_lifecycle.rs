//! End-to-end resource lifecycle tests against a mock controller.

use std::sync::Arc;

use aviatrix::api::Client;
use aviatrix::resources::account::AccountResource;
use aviatrix::resources::firewall_tag::FirewallTagResource;
use aviatrix::resources::spoke_transit_attachment::SpokeTransitAttachmentResource;
use aviatrix::AviatrixProviderData;
use mockito::{Matcher, Server};
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, CreateResourceRequest, ReadResourceRequest, Resource,
    ResourceWithConfigure,
};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

async fn configured_client(server: &Server) -> Client {
    let client = Client::with_base_url(
        &format!("{}/v1/api", server.url()),
        &format!("{}/v1/backend1", server.url()),
        "admin",
        "password",
    )
    .unwrap();
    client.login().await.unwrap();
    client
}

async fn login_mock(server: &mut Server) -> mockito::Mock {
    server
        .mock("POST", "/v1/api")
        .match_body(Matcher::UrlEncoded("action".into(), "login".into()))
        .with_body(r#"{"return": true, "results": {"CID": "cid-1"}}"#)
        .create_async()
        .await
}

async fn configure<R: ResourceWithConfigure>(resource: &mut R, client: Client) {
    let response = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: Some(Arc::new(AviatrixProviderData { client })),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());
}

#[tokio::test]
async fn firewall_tag_create_reads_members_back() {
    let mut server = Server::new_async().await;
    let _login = login_mock(&mut server).await;
    let add_mock = server
        .mock("POST", "/v1/api")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("action".into(), "add_policy_tag".into()),
            Matcher::UrlEncoded("tag_name".into(), "tag-1".into()),
        ]))
        .with_body(r#"{"return": true}"#)
        .create_async()
        .await;
    let members_mock = server
        .mock("POST", "/v1/api")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("action".into(), "update_policy_members".into()),
            Matcher::UrlEncoded(
                "new_policies".into(),
                r#"[{"name":"office","cidr":"192.0.2.0/24"}]"#.into(),
            ),
        ]))
        .with_body(r#"{"return": true}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/v1/api")
        .match_body(Matcher::UrlEncoded(
            "action".into(),
            "list_policy_members".into(),
        ))
        .with_body(
            r#"{"return": true, "results": {
                "tag_name": "tag-1",
                "members": [{"name": "office", "cidr": "192.0.2.0/24"}]
            }}"#,
        )
        .create_async()
        .await;

    let client = configured_client(&server).await;
    let mut resource = FirewallTagResource::new();
    configure(&mut resource, client).await;

    let mut config = DynamicValue::empty_object();
    config
        .set_string(&AttributePath::new("firewall_tag"), "tag-1".to_string())
        .unwrap();
    config
        .set_list(
            &AttributePath::new("cidr_list"),
            vec![Dynamic::Map(HashMap::from([
                (
                    "cidr_tag_name".to_string(),
                    Dynamic::String("office".to_string()),
                ),
                (
                    "cidr".to_string(),
                    Dynamic::String("192.0.2.0/24".to_string()),
                ),
            ]))],
        )
        .unwrap();

    let response = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "aviatrix_firewall_tag".to_string(),
                planned_state: config.clone(),
                config,
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let members = response
        .new_state
        .get_list(&AttributePath::new("cidr_list"))
        .unwrap();
    assert_eq!(members.len(), 1);
    add_mock.assert_async().await;
    members_mock.assert_async().await;
}

#[tokio::test]
async fn account_read_removes_state_when_account_is_gone() {
    let mut server = Server::new_async().await;
    let _login = login_mock(&mut server).await;
    server
        .mock("POST", "/v1/api")
        .match_body(Matcher::UrlEncoded("action".into(), "list_accounts".into()))
        .with_body(r#"{"return": true, "results": {"account_list": []}}"#)
        .create_async()
        .await;

    let client = configured_client(&server).await;
    let mut resource = AccountResource::new();
    configure(&mut resource, client).await;

    let mut state = DynamicValue::empty_object();
    state
        .set_string(&AttributePath::new("account_name"), "gone".to_string())
        .unwrap();

    let response = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "aviatrix_account".to_string(),
                current_state: state,
                private: vec![],
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert!(response.new_state.is_none());
}

#[tokio::test]
async fn attachment_read_removes_state_when_spoke_is_detached() {
    let mut server = Server::new_async().await;
    let _login = login_mock(&mut server).await;
    server
        .mock("GET", "/v1/api")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("action".into(), "get_gateway_info".into()),
            Matcher::UrlEncoded("gateway_name".into(), "spoke-1".into()),
        ]))
        .with_body(
            r#"{"return": true, "results": {
                "vpc_name": "spoke-1",
                "transit_gw_name": "other-transit"
            }}"#,
        )
        .create_async()
        .await;

    let client = configured_client(&server).await;
    let mut resource = SpokeTransitAttachmentResource::new();
    configure(&mut resource, client).await;

    let mut state = DynamicValue::empty_object();
    state
        .set_string(&AttributePath::new("spoke_gw_name"), "spoke-1".to_string())
        .unwrap();
    state
        .set_string(
            &AttributePath::new("transit_gw_name"),
            "transit-1".to_string(),
        )
        .unwrap();

    let response = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "aviatrix_spoke_transit_attachment".to_string(),
                current_state: state,
                private: vec![],
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert!(response.new_state.is_none());
}
