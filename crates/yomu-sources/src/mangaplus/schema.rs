use yomu_codec::proto::{EnumDef, FieldDef, MessageDef, ScalarKind, Schema};

/// Message types of the MANGA Plus web API.
pub fn schema() -> Schema {
    Schema::new()
        .message(
            MessageDef::new("Response")
                .field(FieldDef::message(1, "success", "SuccessResult").oneof("result"))
                .field(FieldDef::message(2, "error", "ErrorResult").oneof("result")),
        )
        .message(
            MessageDef::new("ErrorResult")
                .field(FieldDef::enumeration(1, "action", "Action"))
                .field(FieldDef::message(2, "englishPopup", "Popup"))
                .field(FieldDef::message(3, "spanishPopup", "Popup")),
        )
        .enumeration(
            EnumDef::new("Action")
                .value("DEFAULT", 0)
                .value("UNAUTHORIZED", 1)
                .value("MAINTAINENCE", 2)
                .value("GEOIP_BLOCKING", 3),
        )
        .message(
            MessageDef::new("Popup")
                .field(FieldDef::scalar(1, "subject", ScalarKind::String))
                .field(FieldDef::scalar(2, "body", ScalarKind::String)),
        )
        .message(
            MessageDef::new("SuccessResult")
                .field(FieldDef::scalar(1, "isFeaturedUpdated", ScalarKind::Bool))
                .field(FieldDef::message(5, "allTitlesView", "AllTitlesView").oneof("data"))
                .field(FieldDef::message(6, "titleRankingView", "TitleRankingView").oneof("data"))
                .field(FieldDef::message(8, "titleDetailView", "TitleDetailView").oneof("data"))
                .field(FieldDef::message(10, "mangaViewer", "MangaViewer").oneof("data"))
                .field(FieldDef::message(11, "webHomeView", "WebHomeView").oneof("data")),
        )
        .message(MessageDef::new("TitleRankingView").field(FieldDef::message(1, "titles", "Title").repeated()))
        .message(MessageDef::new("AllTitlesView").field(FieldDef::message(1, "titles", "Title").repeated()))
        .message(
            MessageDef::new("WebHomeView")
                .field(FieldDef::message(2, "groups", "UpdatedTitleGroup").repeated()),
        )
        .message(
            MessageDef::new("UpdatedTitleGroup")
                .field(FieldDef::scalar(1, "groupName", ScalarKind::String))
                .field(FieldDef::message(2, "titles", "UpdatedTitle").repeated()),
        )
        .message(
            MessageDef::new("UpdatedTitle")
                .field(FieldDef::message(1, "title", "Title"))
                .field(FieldDef::scalar(2, "chapterId", ScalarKind::UInt32))
                .field(FieldDef::scalar(3, "chapterName", ScalarKind::String))
                .field(FieldDef::scalar(4, "chapterSubtitle", ScalarKind::String)),
        )
        .message(
            MessageDef::new("TitleDetailView")
                .field(FieldDef::message(1, "title", "Title"))
                .field(FieldDef::scalar(2, "titleImageUrl", ScalarKind::String))
                .field(FieldDef::scalar(3, "overview", ScalarKind::String))
                .field(FieldDef::scalar(4, "backgroundImageUrl", ScalarKind::String))
                .field(FieldDef::scalar(5, "nextTimeStamp", ScalarKind::UInt32))
                .field(FieldDef::enumeration(6, "updateTiming", "UpdateTiming"))
                .field(FieldDef::scalar(7, "viewingPeriodDescription", ScalarKind::String))
                .field(
                    FieldDef::scalar(8, "nonAppearanceInfo", ScalarKind::String)
                        .default_value(""),
                )
                .field(FieldDef::message(9, "firstChapterList", "Chapter").repeated())
                .field(FieldDef::message(10, "lastChapterList", "Chapter").repeated())
                .field(FieldDef::scalar(14, "isSimulReleased", ScalarKind::Bool))
                .field(FieldDef::scalar(17, "chaptersDescending", ScalarKind::Bool)),
        )
        .enumeration(
            EnumDef::new("UpdateTiming")
                .value("NOT_REGULARLY", 0)
                .value("MONDAY", 1)
                .value("TUESDAY", 2)
                .value("WEDNESDAY", 3)
                .value("THURSDAY", 4)
                .value("FRIDAY", 5)
                .value("SATURDAY", 6)
                .value("SUNDAY", 7)
                .value("DAY", 8),
        )
        .message(
            MessageDef::new("Title")
                .field(FieldDef::scalar(1, "titleId", ScalarKind::UInt32))
                .field(FieldDef::scalar(2, "name", ScalarKind::String))
                .field(FieldDef::scalar(3, "author", ScalarKind::String))
                .field(FieldDef::scalar(4, "portraitImageUrl", ScalarKind::String))
                .field(FieldDef::scalar(5, "landscapeImageUrl", ScalarKind::String))
                .field(FieldDef::scalar(6, "viewCount", ScalarKind::UInt32))
                .field(FieldDef::enumeration(7, "language", "Language")),
        )
        .enumeration(EnumDef::new("Language").value("ENGLISH", 0).value("SPANISH", 1))
        .message(
            MessageDef::new("Chapter")
                .field(FieldDef::scalar(1, "titleId", ScalarKind::UInt32))
                .field(FieldDef::scalar(2, "chapterId", ScalarKind::UInt32))
                .field(FieldDef::scalar(3, "name", ScalarKind::String))
                .field(FieldDef::scalar(4, "subTitle", ScalarKind::String).optional())
                .field(FieldDef::scalar(6, "startTimeStamp", ScalarKind::UInt32))
                .field(FieldDef::scalar(7, "endTimeStamp", ScalarKind::UInt32)),
        )
        .message(MessageDef::new("MangaViewer").field(FieldDef::message(1, "pages", "Page").repeated()))
        .message(MessageDef::new("Page").field(FieldDef::message(1, "page", "MangaPage")))
        .message(
            MessageDef::new("MangaPage")
                .field(FieldDef::scalar(1, "imageUrl", ScalarKind::String))
                .field(FieldDef::scalar(2, "width", ScalarKind::UInt32))
                .field(FieldDef::scalar(3, "height", ScalarKind::UInt32))
                .field(FieldDef::scalar(5, "encryptionKey", ScalarKind::String).optional()),
        )
}
