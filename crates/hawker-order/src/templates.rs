//! Vietnamese reply templates for the order flow.
//!
//! Every customer-facing order reply is assembled here so the flow logic
//! stays free of copy. Templates address the customer as "anh/chị" and the
//! shop side as "em", matching the rest of the assistant's voice.

use hawker_core::config::GeneralConfig;
use hawker_core::text::format_vnd;
use hawker_core::types::{ContactInfo, Product};
use uuid::Uuid;

/// Shop identity lines shown in order replies.
#[derive(Clone, Debug)]
pub struct ShopInfo {
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl ShopInfo {
    pub fn from_general(config: &GeneralConfig) -> Self {
        Self {
            name: config.shop_name.clone(),
            phone: config.shop_phone.clone(),
            email: config.shop_email.clone(),
        }
    }
}

/// Short customer-facing order code ("DH-3FA85F64").
pub fn order_code(id: Uuid) -> String {
    let hex = id.simple().to_string();
    format!("DH-{}", hex[..8].to_uppercase())
}

/// Opening ask when no product is on the table yet.
pub fn ask_product() -> String {
    "Em cần biết anh/chị muốn đặt sản phẩm gì ạ? Anh/chị vui lòng cho em tên sản phẩm cụ thể nhé! 📱".to_string()
}

/// Repeat ask when a product turn carried no recognizable product.
pub fn clarify_product() -> String {
    "Dạ, em chưa nhận ra tên sản phẩm ạ. Anh/chị cho em xin tên máy cụ thể (ví dụ: iPhone 15, Galaxy S24) nhé! 📱".to_string()
}

/// The named product is not in the catalog.
pub fn product_not_found(shop: &ShopInfo, query: &str) -> String {
    format!(
        "Rất tiếc, em không tìm thấy sản phẩm '{}' trong hệ thống của {} ạ.\n\n\
         📞 Để được tư vấn sản phẩm tương tự, anh/chị vui lòng liên hệ trực tiếp:\n{}\n\n\
         Chúng tôi có nhiều sản phẩm khác phù hợp với nhu cầu của anh/chị! 🛍️",
        query,
        shop.name,
        contact_block(shop)
    )
}

/// The product only appeared in web reference material; the shop does not
/// carry it.
pub fn external_only(shop: &ShopInfo, name: &str) -> String {
    format!(
        "Rất tiếc, {} hiện không kinh doanh sản phẩm '{}' ạ. Thông tin em đưa ra về sản phẩm này chỉ mang tính tham khảo.\n\n\
         📞 Để được tư vấn sản phẩm thay thế, anh/chị vui lòng liên hệ:\n{}",
        shop.name,
        name,
        contact_block(shop)
    )
}

/// Product pinned; ask for a phone number or delivery address.
pub fn ask_contact(shop: &ShopInfo, product: &Product) -> String {
    format!(
        "📱 Sản phẩm: {}\n💰 Giá tại {}: {}\n✅ Tình trạng: Hiện đang có hàng\n\n\
         Anh/chị cho em xin số điện thoại hoặc địa chỉ giao hàng để em lên đơn ạ! 📝",
        product.name,
        shop.name,
        format_vnd(product.price)
    )
}

/// Repeat ask when a contact turn carried nothing usable.
pub fn clarify_contact() -> String {
    "Dạ, em chưa nhận được thông tin liên hệ ạ. Anh/chị cho em xin số điện thoại hoặc địa chỉ giao hàng để em hoàn tất đơn nhé! 📝".to_string()
}

/// Order placed. Names the code, the product, the captured contact and the
/// shop's own contact lines.
pub fn confirmation(
    shop: &ShopInfo,
    product: &Product,
    contact: &ContactInfo,
    order_id: Uuid,
) -> String {
    format!(
        "✅ Đơn hàng đã được xác nhận!\n\n\
         📦 Mã đơn: {}\n📱 Sản phẩm: {}\n💰 Giá: {}\n📞 Thông tin nhận hàng: {}\n\n\
         {} sẽ liên hệ xác nhận và giao hàng sớm nhất ạ. Cần hỗ trợ thêm, anh/chị liên hệ:\n{}\n\n\
         Cảm ơn anh/chị đã mua hàng tại {}! 🙏",
        order_code(order_id),
        product.name,
        format_vnd(product.price),
        contact.value(),
        shop.name,
        contact_block(shop),
        shop.name
    )
}

/// Explicit cancellation acknowledged.
pub fn cancelled() -> String {
    "Dạ, em đã hủy yêu cầu đặt hàng ạ. Khi nào cần, anh/chị cứ nhắn cho em nhé! 🙏".to_string()
}

/// Order closed after too many turns without progress.
pub fn abandoned() -> String {
    "Em tạm đóng yêu cầu đặt hàng do lâu chưa nhận được thông tin ạ. Khi nào muốn đặt lại, anh/chị cứ nhắn em nhé!".to_string()
}

/// A turn arrived for an order that is already confirmed.
pub fn already_confirmed(shop: &ShopInfo, order_id: Option<Uuid>) -> String {
    match order_id {
        Some(id) => format!(
            "Dạ, đơn {} của anh/chị đã được xác nhận rồi ạ. Cần hỗ trợ thêm, anh/chị gọi {} giúp em nhé!",
            order_code(id),
            shop.phone
        ),
        None => format!(
            "Dạ, đơn hàng của anh/chị đã được xác nhận rồi ạ. Cần hỗ trợ thêm, anh/chị gọi {} giúp em nhé!",
            shop.phone
        ),
    }
}

fn contact_block(shop: &ShopInfo) -> String {
    format!("• Điện thoại: {}\n• Email: {}", shop.phone, shop.email)
}
