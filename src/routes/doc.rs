use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        bonus::BonusBalance,
        cart::{AddToCartRequest, CartItemDto, CartList, SetQuantityRequest},
        favorites::{AddFavoriteRequest, FavoriteProductList},
        orders::{OrderItemRequest, OrderList, OrderWithItems, PlaceOrderRequest},
        products::{ApprovalRequest, CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{SubmitReviewRequest, UpdateReviewRequest},
        tasks::TaskList,
    },
    models::{CartItem, Category, Favorite, Order, OrderItem, Product, Review, User, UserTask},
    response::{ApiResponse, Meta},
    routes::{admin, auth, bonus, cart, favorites, health, orders, params, products, reviews, tasks},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::set_quantity,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::place_order,
        orders::list_orders,
        orders::get_order,
        reviews::submit_review,
        reviews::update_review,
        reviews::delete_review,
        tasks::list_tasks,
        tasks::generate_tasks,
        bonus::get_bonus,
        favorites::list_favorites,
        favorites::add_favorite,
        favorites::remove_favorite,
        admin::list_pending_products,
        admin::set_product_approval
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            Favorite,
            CartItem,
            Order,
            OrderItem,
            Review,
            UserTask,
            AddToCartRequest,
            SetQuantityRequest,
            CartItemDto,
            CartList,
            PlaceOrderRequest,
            OrderItemRequest,
            OrderList,
            OrderWithItems,
            SubmitReviewRequest,
            UpdateReviewRequest,
            TaskList,
            BonusBalance,
            AddFavoriteRequest,
            FavoriteProductList,
            CreateProductRequest,
            UpdateProductRequest,
            ApprovalRequest,
            ProductList,
            params::Pagination,
            params::ProductQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CartList>,
            ApiResponse<TaskList>,
            ApiResponse<BonusBalance>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order checkout endpoints"),
        (name = "Reviews", description = "Product review endpoints"),
        (name = "Tasks", description = "Monthly purchase task endpoints"),
        (name = "Bonus", description = "Bonus point endpoints"),
        (name = "Favorites", description = "Favorite endpoints"),
        (name = "Admin", description = "Moderation endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
