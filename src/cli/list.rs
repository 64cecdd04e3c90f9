mod table;

use table::Table;

use crate::catalog::populate::populated_exchange;
use crate::config::read_config;
use crate::dispatch::Exchange;
use crate::{ListArgs, ListObject, ListingFormat};

#[derive(serde::Serialize)]
struct ListedModel {
    name: String,
    model_id: String,
    backend: String,
}

impl From<Vec<ListedModel>> for Table {
    fn from(value: Vec<ListedModel>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["NAME", "MODEL", "BACKEND"]);

        for model in value {
            tab.add_row(vec![model.name, model.model_id, model.backend]);
        }

        tab
    }
}

#[derive(serde::Serialize)]
struct ListedBackend {
    backend: String,
    models: usize,
}

impl From<Vec<ListedBackend>> for Table {
    fn from(value: Vec<ListedBackend>) -> Self {
        let mut tab = Table::new();

        tab.set_header(vec!["BACKEND", "MODELS"]);

        for backend in value {
            tab.add_row(vec![backend.backend, backend.models.to_string()]);
        }

        tab
    }
}

fn listed_models(exchange: &Exchange, args: &crate::ListModelArgs) -> Vec<ListedModel> {
    exchange
        .catalog()
        .backends()
        .filter(|(id, _)| args.backend.map_or(true, |filter| filter == *id))
        .flat_map(|(id, models)| {
            models.iter().map(move |model| ListedModel {
                name: model.label.clone(),
                model_id: model.id.clone(),
                backend: id.to_string(),
            })
        })
        .collect()
}

fn listed_backends(exchange: &Exchange) -> Vec<ListedBackend> {
    exchange
        .catalog()
        .backends()
        .map(|(id, models)| ListedBackend {
            backend: id.to_string(),
            models: models.len(),
        })
        .collect()
}

fn format_output<O: Into<Table> + serde::Serialize>(object: O, format: ListingFormat) {
    match format {
        ListingFormat::Json => {
            let output = serde_json::to_string_pretty(&object).expect("failed to serialize object");

            println!("{}", output);
        }
        ListingFormat::Table => {
            print!("{}", object.into());
        }
        ListingFormat::HeaderlessTable => {
            let mut tab: Table = object.into();

            tab.show_header(false);

            print!("{}", tab);
        }
    }
}

pub(crate) async fn list_cmd(args: &ListArgs) {
    let format = args.format;

    let config = read_config(None);
    let exchange = populated_exchange(&config).await;

    match &args.object {
        ListObject::Models(margs) => {
            format_output(listed_models(&exchange, margs), format);
        }
        ListObject::Backends => {
            format_output(listed_backends(&exchange), format);
        }
    }
}
