//! Route set of the storefront client.

use crate::routes::table::{RouteTable, RouteTableError};

/// Every storefront page, keyed by the component name it renders.
///
/// # Errors
///
/// Only if the declarations below are edited into an invalid table.
pub fn storefront() -> Result<RouteTable<&'static str>, RouteTableError> {
    RouteTable::builder()
        .route("/", "Home")
        .route("/home", "Home")
        .route("/product/:id", "ProductDetails")
        .route("/categories", "Categories")
        .route("/contact", "Contact")
        .route("/about", "About")
        .route("*", "NotFound")
        .route("/signin", "SignIn")
        .route("/signup", "SignUp")
        .route("/reset-password", "ResetPassword")
        .route("/account-blocked", "AccountBlocked")
        .route("/complete-profile", "CompleteProfile")
        .route("/profile", "Profile")
        .route("/cart", "Cart")
        .protected("/checkout", "Checkout", "user")
        .route("/order-confirmation", "OrderConfirmation")
        .protected("/orders", "Orders", "user")
        .protected("/admin/dashboard", "AdminDashboard", "admin")
        .protected("/admin/products", "AdminProducts", "admin")
        .protected("/admin/users", "AdminUsers", "admin")
        .protected("/admin/orders", "AdminOrders", "admin")
        .build()
}
