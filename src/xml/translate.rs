//! Translator between the registry's namespaced XML dialect and the
//! domain value types.
//!
//! The subscription service speaks the `wsabonnement` dialect, the
//! institution directory the `listEtablissement` dialect. Every value
//! interpolated into outgoing payloads is XML-escaped.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use quick_xml::escape::escape;

use crate::error::{GarError, Result};
use crate::types::{
    Assignment, CreatableSubscription, Institution, InstitutionDirectory, Resource, Subscription,
    SubscriptionFilter,
};
use crate::xml::tree::{parse_document, Element};

/// Namespace of the subscription dialect. The server omits it on the
/// root of single-subscription GET responses; it must be re-injected
/// before POSTing a patched node back.
pub const SUBSCRIPTION_NS: &str = "http://www.atosworldline.com/wsabonnement/v1.0/";

/// Namespace of the institution directory payload.
pub const INSTITUTION_NS: &str = "http://www.atosworldline.com/listEtablissement/v1.0/";

/// Date format for outgoing create/update payloads: no sub-second
/// part, no zone suffix.
const CREATE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse the full institution directory.
///
/// The root's direct children are institution nodes; each node's
/// children are flattened by local name into a string record keyed by
/// its `uai` field.
pub fn parse_institution_list(bytes: &[u8]) -> Result<InstitutionDirectory> {
    let root = parse_document(bytes)?;
    let mut directory = InstitutionDirectory::new();

    for node in &root.children {
        let mut record = Institution::new();
        for child in &node.children {
            record.insert(child.name.clone(), child.text.clone());
        }
        let uai = record
            .get("uai")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GarError::malformed("institution node without uai"))?
            .clone();
        directory.insert(uai, record);
    }

    Ok(directory)
}

/// Parse a subscription result set, preserving server order.
pub fn parse_subscription_list(bytes: &[u8]) -> Result<Vec<Subscription>> {
    let root = parse_document(bytes)?;
    root.children.iter().map(subscription_from_node).collect()
}

/// Parse the top-level subscription nodes without interpreting them.
/// The update flow patches one of these and posts it back verbatim.
pub fn parse_subscription_nodes(bytes: &[u8]) -> Result<Vec<Element>> {
    Ok(parse_document(bytes)?.children)
}

/// Values of a subscription node's children, grouped by local name. A
/// group of exactly one element collapses to a scalar; repeats stay an
/// ordered list (this carries the repeatable `publicCible` element).
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    fn into_list(self) -> Vec<String> {
        match self {
            FieldValue::Scalar(v) => vec![v],
            FieldValue::List(vs) => vs,
        }
    }
}

fn group_children(node: &Element) -> BTreeMap<String, FieldValue> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for child in &node.children {
        groups
            .entry(child.name.clone())
            .or_default()
            .push(child.text.clone());
    }
    groups
        .into_iter()
        .map(|(name, mut values)| {
            let value = if values.len() == 1 {
                FieldValue::Scalar(values.remove(0))
            } else {
                FieldValue::List(values)
            };
            (name, value)
        })
        .collect()
}

fn subscription_from_node(node: &Element) -> Result<Subscription> {
    let mut fields = group_children(node);

    let mut required = |name: &str| -> Result<String> {
        match fields.remove(name) {
            Some(FieldValue::Scalar(v)) => Ok(v),
            Some(FieldValue::List(_)) => Err(GarError::malformed(format!(
                "subscription field {name} repeated"
            ))),
            None => Err(GarError::malformed(format!(
                "subscription node missing {name}"
            ))),
        }
    };

    let subscription_id = required("idAbonnement")?;
    let distributor_id = required("idDistributeurCom")?;
    let resource_id = required("idRessource")?;
    let from = parse_wire_datetime(&required("debutValidite")?)?;
    let to = parse_wire_datetime(&required("finValidite")?)?;
    let uai = required("uaiEtab")?;
    let audience = fields
        .remove("publicCible")
        .map(FieldValue::into_list)
        .unwrap_or_default();

    Ok(Subscription {
        subscription_id,
        distributor_id,
        resource_id,
        from,
        to,
        uai,
        audience,
    })
}

/// Parse a wire timestamp: sub-second precision plus zone suffix, e.g.
/// `2024-09-01T00:00:00.000+02:00`.
pub fn parse_wire_datetime(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| GarError::malformed(format!("bad timestamp {value:?}: {e}")))
}

/// Serialize a filter query. One `filtre` node per present field, in
/// fixed mapping order; the namespaced container is emitted even when
/// no filter is present (an empty filter matches everything).
pub fn serialize_filter(filter: &SubscriptionFilter) -> String {
    let mappings = [
        ("idDistributeurCom", &filter.distributor_id),
        ("uaiEtab", &filter.uai),
        ("idAbonnement", &filter.subscription_id),
        ("typeAffectation", &filter.assignment_type),
        ("categorieAffectation", &filter.assignment_category),
        ("publicCible", &filter.target_audience),
        ("codeProjetRessource", &filter.resource_id),
    ];

    let mut out = format!(r#"<filtres xmlns="{SUBSCRIPTION_NS}">"#);
    for (wire_name, value) in mappings {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            let _ = write!(
                out,
                "<filtre><filtreNom>{wire_name}</filtreNom><filtreValeur>{}</filtreValeur></filtre>",
                escape(value)
            );
        }
    }
    out.push_str("</filtres>");
    out
}

/// Serialize a subscription create payload: fixed element sequence
/// inside the namespaced `abonnement` element.
pub fn serialize_create(
    subscription: &dyn CreatableSubscription,
    resource: &Resource,
    assignment: &Assignment,
    distributor_id: &str,
) -> Result<String> {
    let from = subscription
        .valid_from()
        .ok_or_else(|| GarError::InvalidRequest("validity window start is required".into()))?;
    let to = subscription
        .valid_to()
        .ok_or_else(|| GarError::InvalidRequest("validity window end is required".into()))?;

    let mut out = format!(r#"<abonnement xmlns="{SUBSCRIPTION_NS}">"#);
    let mut tag = |name: &str, value: &str| {
        let _ = write!(out, "<{name}>{}</{name}>", escape(value));
    };

    tag("idAbonnement", subscription.subscription_id());
    tag("idDistributeurCom", distributor_id);
    tag("idRessource", &resource.id);
    tag("typeIdRessource", &resource.kind);
    tag("libelleRessource", &resource.label);
    tag("debutValidite", &format_create_date(from));
    tag("finValidite", &format_create_date(to));
    tag("uaiEtab", subscription.uai());
    tag("categorieAffectation", &assignment.category);
    tag("typeAffectation", &assignment.kind);
    tag("nbLicenceGlobale", &assignment.num_global_licence);
    for audience in &assignment.audience {
        tag("publicCible", audience.as_str());
    }
    if let Some(code) = subscription.resource_project_code() {
        tag("codeProjetRessource", code);
    }
    out.push_str("</abonnement>");
    Ok(out)
}

/// Format a validity bound for an outgoing payload.
pub fn format_create_date(value: NaiveDateTime) -> String {
    value.format(CREATE_DATE_FORMAT).to_string()
}

/// Rebuild a previously-fetched subscription node for a date update:
/// drop the institution-code element, overwrite either validity bound
/// only when a replacement is supplied, and re-inject the namespace on
/// the root (the GET response omits it).
pub fn patch_subscription_dates(
    node: &Element,
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
) -> Element {
    let mut patched = node.without_child("uaiEtab");
    if let Some(from) = from {
        patched = patched.with_child_text("debutValidite", &format_create_date(from));
    }
    if let Some(to) = to {
        patched = patched.with_child_text("finValidite", &format_create_date(to));
    }
    patched.with_attribute("xmlns", SUBSCRIPTION_NS)
}
