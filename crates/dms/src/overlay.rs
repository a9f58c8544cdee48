//! Overlay rendering for the presentation layer

use camera_capture::VideoFrame;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::{BehaviorClass, DecisionResult, DmsError, FaceBox};

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

/// Alert border thickness (pixels)
const BORDER: u32 = 5;
/// Face box line thickness (pixels)
const FACE_LINE: u32 = 2;
/// Label swatch size (pixels)
const SWATCH: u32 = 24;

/// Label color: green for safe driving, red otherwise
pub fn label_color(label: BehaviorClass) -> Rgb<u8> {
    if label == BehaviorClass::SafeDriving {
        GREEN
    } else {
        RED
    }
}

fn thick_rect(image: &mut RgbImage, left: i32, top: i32, width: u32, height: u32, thickness: u32, color: Rgb<u8>) {
    for inset in 0..thickness {
        let w = width.saturating_sub(2 * inset);
        let h = height.saturating_sub(2 * inset);
        if w == 0 || h == 0 {
            break;
        }
        let rect = Rect::at(left + inset as i32, top + inset as i32).of_size(w, h);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Draw the face box, label swatch, and alert markers onto a copy of the frame.
///
/// - face box in the label color
/// - red border while alerting
/// - yellow bar along the top edge when no face was detected
pub fn render(
    frame: &VideoFrame,
    decision: Option<&DecisionResult>,
    face: Option<&FaceBox>,
) -> Result<RgbImage, DmsError> {
    let mut image = frame
        .to_image()
        .ok_or_else(|| DmsError::ImageProcessing("frame buffer does not match its size".into()))?;
    let (width, height) = image.dimensions();
    let color = decision.map_or(GREEN, |d| label_color(d.label));

    match face.and_then(|f| f.to_pixels(width, height)) {
        Some((left, top, w, h)) => {
            thick_rect(&mut image, left as i32, top as i32, w, h, FACE_LINE, color);
        }
        None => {
            let bar = BORDER.min(height);
            if width > 0 && bar > 0 {
                draw_filled_rect_mut(&mut image, Rect::at(0, 0).of_size(width, bar), YELLOW);
            }
        }
    }

    if decision.is_some() && width > SWATCH + BORDER && height > SWATCH + BORDER {
        let offset = (BORDER * 2) as i32;
        draw_filled_rect_mut(&mut image, Rect::at(offset, offset).of_size(SWATCH, SWATCH), color);
    }

    if decision.is_some_and(|d| d.alerting) {
        thick_rect(&mut image, 0, 0, width, height, BORDER, RED);
    }

    Ok(image)
}
