//! Documents and a scratch store shared by the unit tests.

use std::path::Path;

use anyhow::Result;
use serde_json::{Value, json};
use store::FjallQuadStore;

use crate::GraphDb;

pub(crate) fn open_db(dir: &Path) -> Result<GraphDb<FjallQuadStore>> {
    let keyspace = fjall::Config::new(dir).temporary(true).open()?;
    Ok(GraphDb::new(FjallQuadStore::new(keyspace)?))
}

pub(crate) fn manu() -> Value {
    json!({
        "@context": {
            "name": "http://xmlns.com/foaf/0.1/name",
            "homepage": { "@id": "http://xmlns.com/foaf/0.1/homepage", "@type": "@id" }
        },
        "@id": "http://manu.sporny.org#person",
        "name": "Manu Sporny",
        "homepage": "http://manu.sporny.org/"
    })
}

pub(crate) fn tesla() -> Value {
    json!({
        "@context": {
            "gr": "http://purl.org/goodrelations/v1#",
            "pto": "http://www.productontology.org/id/",
            "foaf": "http://xmlns.com/foaf/0.1/",
            "xsd": "http://www.w3.org/2001/XMLSchema#",
            "foaf:page": { "@type": "@id" },
            "gr:acceptedPaymentMethods": { "@type": "@id" },
            "gr:hasBusinessFunction": { "@type": "@id" },
            "gr:hasCurrencyValue": { "@type": "xsd:float" }
        },
        "@id": "http://example.org/cars/for-sale#tesla",
        "@type": "gr:Offering",
        "gr:name": "Used Tesla Roadster",
        "gr:description": "Need to sell fast and furiously",
        "gr:hasBusinessFunction": "gr:Sell",
        "gr:acceptedPaymentMethods": "gr:Cash",
        "gr:hasPriceSpecification": {
            "gr:hasCurrencyValue": "85000",
            "gr:hasCurrency": "USD"
        },
        "gr:includes": {
            "@type": ["gr:Individual", "pto:Vehicle"],
            "gr:name": "Tesla Roadster",
            "foaf:page": "http://www.teslamotors.com/roadster"
        }
    })
}

pub(crate) fn library() -> Value {
    json!({
        "@context": {
            "dc": "http://purl.org/dc/elements/1.1/",
            "ex": "http://example.org/vocab#",
            "ex:contains": { "@type": "@id" }
        },
        "@graph": [
            {
                "@id": "http://example.org/library",
                "@type": "ex:Library",
                "ex:contains": "http://example.org/library/the-republic"
            },
            {
                "@id": "http://example.org/library/the-republic",
                "@type": "ex:Book",
                "dc:creator": "Plato",
                "dc:title": "The Republic",
                "ex:contains": "http://example.org/library/the-republic#introduction"
            },
            {
                "@id": "http://example.org/library/the-republic#introduction",
                "@type": "ex:Chapter",
                "dc:description": "An introductory chapter on The Republic.",
                "dc:title": "The Introduction"
            }
        ]
    })
}

pub(crate) fn chain_context() -> Value {
    json!({
        "link": { "@id": "http://example.org/link#", "@type": "@id" },
        "@base": "https://levelgraph.io/get/",
        "@vocab": "http://example.org/vocab#"
    })
}

/// Nodes `0..len`, each linking to the next.
pub(crate) fn chain(len: usize) -> Value {
    let nodes: Vec<Value> = (0..len)
        .map(|k| {
            json!({
                "@id": k.to_string(),
                "value": k.to_string(),
                "link": (k + 1).to_string()
            })
        })
        .collect();
    json!({ "@context": chain_context(), "@graph": nodes })
}

/// `document` without its `key` entry.
pub(crate) fn without(mut document: Value, key: &str) -> Value {
    if let Some(map) = document.as_object_mut() {
        map.remove(key);
    }
    document
}
