//! Category resource with embedded products.
//!
//! # Responsibility
//! - Define the `categories` collection (unique `name`) and its `products`
//!   sub-collection (`name` unique per category).
//! - Provide the list/add/update/toggle/remove controller surface for both
//!   levels, plus response views.
//!
//! # Invariants
//! - Views never expose soft-deleted products.
//! - Path identifiers are validated before any repository access.

use crate::model::audit::AuditEntry;
use crate::model::document::{Document, DocumentId, Fields, NewDocument, SubDocument};
use crate::model::schema::CollectionSchema;
use crate::repo::document_repo::DocumentRepository;
use crate::repo::store::{DocumentStore, Filter};
use crate::resource::{ControllerResult, RequestContext};
use crate::service::endpoint_service::EndpointService;
use crate::service::pagination::{
    paginate_array, paginate_from_store, parse_page_param, PageResult,
};
use crate::validation::{CategoryInput, IdInput, ProductInput, Rule, ValidationError};
use serde::Serialize;
use serde_json::Value;

pub const CATEGORY_COLLECTION: &str = "categories";
pub const PRODUCTS_FIELD: &str = "products";

/// Schema of the category collection.
pub fn category_schema() -> CollectionSchema {
    CollectionSchema::new(CATEGORY_COLLECTION, "name")
        .with_sub_collection(PRODUCTS_FIELD, "name")
}

/// Builds the list filter from the `isActive` query parameter.
///
/// `"true"` selects active records, any other value inactive ones, and an
/// absent parameter applies no constraint.
pub fn list_filter_from_query(is_active: Option<&str>) -> Filter {
    match is_active {
        Some(raw) => Filter::new().active(raw == "true"),
        None => Filter::new(),
    }
}

/// Provenance as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditView {
    pub user_id: String,
    pub name: String,
    /// RFC 3339 timestamp with the original offset.
    pub date: String,
    pub description: String,
}

impl From<&AuditEntry> for AuditView {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            user_id: entry.actor_id.clone(),
            name: entry.actor_name.clone(),
            date: entry.timestamp.to_rfc3339(),
            description: entry.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: DocumentId,
    pub name: String,
    pub description: String,
    pub quantity: Value,
    pub is_active: bool,
    pub created_by: Option<AuditView>,
    pub updated_by: Vec<AuditView>,
    pub deleted_by: Option<AuditView>,
}

impl From<&SubDocument> for ProductView {
    fn from(product: &SubDocument) -> Self {
        Self {
            id: product.id,
            name: text_field(product.field("name")),
            description: text_field(product.field("description")),
            quantity: product
                .field("quantity")
                .cloned()
                .unwrap_or_else(|| Value::from(0)),
            is_active: product.is_active,
            created_by: product.created_by.as_ref().map(AuditView::from),
            updated_by: product.updated_by.iter().map(AuditView::from).collect(),
            deleted_by: product.deleted_by.as_ref().map(AuditView::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
    pub id: DocumentId,
    pub name: String,
    pub products: Vec<ProductView>,
    pub is_active: bool,
    pub created_by: Option<AuditView>,
    pub updated_by: Vec<AuditView>,
    pub deleted_by: Option<AuditView>,
}

impl From<&Document> for CategoryView {
    fn from(category: &Document) -> Self {
        Self {
            id: category.id,
            name: text_field(category.field("name")),
            products: live_products(category).map(ProductView::from).collect(),
            is_active: category.is_active,
            created_by: category.created_by.as_ref().map(AuditView::from),
            updated_by: category.updated_by.iter().map(AuditView::from).collect(),
            deleted_by: category.deleted_by.as_ref().map(AuditView::from),
        }
    }
}

/// Category endpoints over a borrowed repository.
pub struct CategoryController<'r, S: DocumentStore> {
    endpoint: EndpointService<'r, S>,
}

impl<'r, S: DocumentStore> CategoryController<'r, S> {
    pub fn new(repo: &'r DocumentRepository<S>) -> Self {
        Self {
            endpoint: EndpointService::new(repo),
        }
    }

    fn repo(&self) -> &'r DocumentRepository<S> {
        self.endpoint.repository()
    }

    /// Creates a category, optionally with initial `products`.
    pub fn add(&self, body: &Value, ctx: &RequestContext) -> ControllerResult<CategoryView> {
        let category = CategoryInput::validate(body)?;
        let products = match body.get(PRODUCTS_FIELD) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| ProductInput::validate(item).map(|input| product_fields(&input)))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(ValidationError {
                    property: PRODUCTS_FIELD.to_string(),
                    message: Rule::Array.error_message(),
                }
                .into())
            }
        };

        let data = NewDocument::new(name_fields(category.name()))
            .with_sub_documents(PRODUCTS_FIELD, products);
        let inserted = self
            .endpoint
            .insert_doc(data, &ctx.principal, &ctx.action)?;
        Ok(CategoryView::from(&inserted))
    }

    /// Lists categories page by page, optionally filtered by `isActive`.
    pub fn list(
        &self,
        page: Option<&str>,
        limit: Option<&str>,
        is_active: Option<&str>,
    ) -> ControllerResult<PageResult<CategoryView>> {
        Ok(paginate_from_store(
            self.repo(),
            |category: &Document| CategoryView::from(category),
            &list_filter_from_query(is_active),
            parse_page_param(page),
            parse_page_param(limit),
        )?)
    }

    pub fn update(
        &self,
        id: &str,
        body: &Value,
        ctx: &RequestContext,
    ) -> ControllerResult<CategoryView> {
        let id = IdInput::validate(id)?.id();
        let category = CategoryInput::validate(body)?;
        let updated = self.endpoint.update_doc(
            id,
            &name_fields(category.name()),
            &ctx.principal,
            &ctx.action,
        )?;
        Ok(CategoryView::from(&updated))
    }

    /// Flips `isActive` and returns the re-read category.
    pub fn toggle(&self, id: &str, ctx: &RequestContext) -> ControllerResult<CategoryView> {
        let id = IdInput::validate(id)?.id();
        self.endpoint.toggle_doc(id, &ctx.principal, &ctx.action)?;
        Ok(CategoryView::from(&self.repo().find_by_id(id)?))
    }

    pub fn remove(&self, id: &str, ctx: &RequestContext) -> ControllerResult<()> {
        let id = IdInput::validate(id)?.id();
        self.endpoint.soft_delete_doc(id, &ctx.principal, &ctx.action)?;
        Ok(())
    }

    pub fn add_product(
        &self,
        category_id: &str,
        body: &Value,
        ctx: &RequestContext,
    ) -> ControllerResult<CategoryView> {
        let category_id = IdInput::validate(category_id)?.id();
        let product = ProductInput::validate(body)?;
        let updated = self.endpoint.insert_sub_doc(
            category_id,
            PRODUCTS_FIELD,
            product_fields(&product),
            &ctx.principal,
            &ctx.action,
        )?;
        Ok(CategoryView::from(&updated))
    }

    pub fn update_product(
        &self,
        category_id: &str,
        product_id: &str,
        body: &Value,
        ctx: &RequestContext,
    ) -> ControllerResult<CategoryView> {
        let category_id = IdInput::validate(category_id)?.id();
        let product_id = IdInput::validate(product_id)?.id();
        let product = ProductInput::validate(body)?;
        let updated = self.endpoint.update_sub_doc(
            category_id,
            product_id,
            PRODUCTS_FIELD,
            &product_fields(&product),
            &ctx.principal,
            &ctx.action,
        )?;
        Ok(CategoryView::from(&updated))
    }

    pub fn toggle_product(
        &self,
        category_id: &str,
        product_id: &str,
        ctx: &RequestContext,
    ) -> ControllerResult<CategoryView> {
        let category_id = IdInput::validate(category_id)?.id();
        let product_id = IdInput::validate(product_id)?.id();
        let updated = self.endpoint.toggle_sub_doc(
            category_id,
            product_id,
            PRODUCTS_FIELD,
            &ctx.principal,
            &ctx.action,
        )?;
        Ok(CategoryView::from(&updated))
    }

    pub fn remove_product(
        &self,
        category_id: &str,
        product_id: &str,
        ctx: &RequestContext,
    ) -> ControllerResult<CategoryView> {
        let category_id = IdInput::validate(category_id)?.id();
        let product_id = IdInput::validate(product_id)?.id();
        let updated = self.endpoint.soft_delete_sub_doc(
            category_id,
            product_id,
            PRODUCTS_FIELD,
            &ctx.principal,
            &ctx.action,
        )?;
        Ok(CategoryView::from(&updated))
    }

    /// Pages through the active products of one category.
    pub fn list_products(
        &self,
        category_id: &str,
        page: Option<&str>,
        limit: Option<&str>,
    ) -> ControllerResult<PageResult<ProductView>> {
        let category_id = IdInput::validate(category_id)?.id();
        let category = self.repo().find_by_id(category_id)?;
        let products: Vec<&SubDocument> = live_products(&category)
            .filter(|product| product.is_active)
            .collect();

        Ok(paginate_array(
            &products,
            |product| ProductView::from(*product),
            parse_page_param(page),
            parse_page_param(limit),
        ))
    }
}

fn live_products(category: &Document) -> impl Iterator<Item = &SubDocument> {
    category
        .sub_documents(PRODUCTS_FIELD)
        .iter()
        .filter(|product| !product.is_deleted)
}

fn name_fields(name: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("name".to_string(), Value::String(name.to_string()));
    fields
}

fn product_fields(product: &ProductInput) -> Fields {
    let mut fields = name_fields(product.name());
    fields.insert(
        "description".to_string(),
        Value::String(product.description().to_string()),
    );
    fields.insert(
        "quantity".to_string(),
        Value::Number(product.quantity().clone()),
    );
    fields
}

fn text_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{list_filter_from_query, AuditView};
    use crate::model::audit::AuditEntry;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn is_active_query_maps_to_boolean_filter() {
        assert_eq!(list_filter_from_query(Some("true")).is_active, Some(true));
        assert_eq!(list_filter_from_query(Some("yes")).is_active, Some(false));
        assert_eq!(list_filter_from_query(None).is_active, None);
    }

    #[test]
    fn audit_view_keeps_offset_in_date() {
        let entry = AuditEntry {
            actor_id: "u-1".to_string(),
            actor_name: "Ayu".to_string(),
            timestamp: FixedOffset::east_opt(7 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
                .unwrap(),
            description: "POST category add".to_string(),
        };
        let view = AuditView::from(&entry);
        assert_eq!(view.user_id, "u-1");
        assert_eq!(view.date, "2024-03-01T09:30:00+07:00");
    }
}
