//! Device and image queries.
//!
//! Plain synchronous functions over a borrowed [`Connection`]; the async
//! [`SqliteStore`](super::SqliteStore) runs them on the blocking pool.

use rusqlite::{Connection, OptionalExtension};

use crate::models::{Device, Image, NewImage};
use crate::Result;

/// Expects columns in order: id, url, device_id.
fn parse_image_row(row: &rusqlite::Row) -> rusqlite::Result<Image> {
    Ok(Image {
        id: row.get(0)?,
        url: row.get(1)?,
        device_id: row.get(2)?,
    })
}

fn parse_device_row(row: &rusqlite::Row) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get(0)?,
        address: row.get(1)?,
    })
}

/// Register a device with the given address.
///
/// Fails if the address is already taken.
pub fn create_device(conn: &Connection, address: &str) -> Result<Device> {
    conn.execute(
        "INSERT INTO devices (address) VALUES (:address)",
        rusqlite::named_params! { ":address": address },
    )?;

    Ok(Device {
        id: conn.last_insert_rowid(),
        address: address.to_string(),
    })
}

pub fn find_device_by_address(conn: &Connection, address: &str) -> Result<Option<Device>> {
    let device = conn
        .query_row(
            "SELECT id, address FROM devices WHERE address = :address",
            rusqlite::named_params! { ":address": address },
            parse_device_row,
        )
        .optional()?;

    Ok(device)
}

/// All images owned by the device registered under `address`, oldest first.
///
/// An unknown address yields an empty list.
pub fn find_images_by_device_address(conn: &Connection, address: &str) -> Result<Vec<Image>> {
    let mut stmt = conn.prepare(
        "SELECT images.id, images.url, images.device_id
         FROM images
         JOIN devices ON devices.id = images.device_id
         WHERE devices.address = :address
         ORDER BY images.id",
    )?;

    let images = stmt
        .query_map(
            rusqlite::named_params! { ":address": address },
            parse_image_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(images)
}

pub fn find_image(conn: &Connection, id: i64) -> Result<Option<Image>> {
    let image = conn
        .query_row(
            "SELECT id, url, device_id FROM images WHERE id = :id",
            rusqlite::named_params! { ":id": id },
            parse_image_row,
        )
        .optional()?;

    Ok(image)
}

/// Insert an image row. The owning device must already exist.
pub fn create_image(conn: &Connection, image: &NewImage) -> Result<Image> {
    conn.execute(
        "INSERT INTO images (url, device_id) VALUES (:url, :device_id)",
        rusqlite::named_params! {
            ":url": &image.url,
            ":device_id": image.device_id,
        },
    )?;

    Ok(Image {
        id: conn.last_insert_rowid(),
        url: image.url.clone(),
        device_id: image.device_id,
    })
}

/// Hard-delete an image, returning the row as it was before deletion.
pub fn delete_image(conn: &Connection, id: i64) -> Result<Option<Image>> {
    let image = conn
        .query_row(
            "DELETE FROM images WHERE id = :id RETURNING id, url, device_id",
            rusqlite::named_params! { ":id": id },
            parse_image_row,
        )
        .optional()?;

    Ok(image)
}
