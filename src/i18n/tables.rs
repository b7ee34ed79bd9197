//! Built-in string tables.

use super::{Language, MessageKey};

use Language::{En, Ru, Uk};
use MessageKey::*;

const CHOOSE_LANGUAGE: &str = "🌐 Оберіть мову / Choose your language / Выберите язык:";

pub(super) const ENTRIES: &[(Language, MessageKey, &str)] = &[
    // ── English ─────────────────────────────────────────────────────
    (En, ChooseLanguage, CHOOSE_LANGUAGE),
    (
        En,
        Welcome,
        "👋 Welcome to the worker registration service!\n\n\
         I will help you register. It only takes a couple of minutes.\n\n\
         First, please enter your full name:",
    ),
    (
        En,
        NameInvalid,
        "❌ The name must be at least 2 characters and contain only letters, spaces, \
         hyphens or apostrophes. Please try again:",
    ),
    (
        En,
        NameAccepted,
        "✅ Great, {name}!\n\nNow enter your age ({min} to {max} years):",
    ),
    (
        En,
        AgeInvalid,
        "❌ Age must be a whole number from {min} to {max}. Please try again:",
    ),
    (
        En,
        AgeAccepted,
        "✅ Age accepted!\n\nNow enter your phone number in the format:\n\
         +380XXXXXXXXX or 0XXXXXXXXX",
    ),
    (
        En,
        PhoneInvalid,
        "❌ Invalid phone number.\nUse the format +380XXXXXXXXX or 0XXXXXXXXX\n\
         Please try again:",
    ),
    (
        En,
        ConfirmSummary,
        "📋 Please check your details:\n\n\
         👤 Name: {name}\n\
         🎂 Age: {age}\n\
         📞 Phone: {phone} ({phone_local})\n\n\
         Is everything correct? Reply 'yes' to confirm or 'no' to start over.",
    ),
    (
        En,
        ConfirmClarify,
        "❓ Please reply 'yes' to confirm or 'no' to start over:",
    ),
    (
        En,
        Success,
        "✅ Registration complete!\n\n\
         Your details have been saved. Our HR manager will contact you soon.\n\n\
         Thank you for registering! 🎉",
    ),
    (
        En,
        SubmitFailed,
        "❌ A technical error occurred. Please try again later.",
    ),
    (
        En,
        Restart,
        "🔄 All right, let's start over.\nEnter your full name:",
    ),
    (
        En,
        Cancelled,
        "❌ Registration cancelled.\nIf you change your mind, use /start to register.",
    ),
    (
        En,
        NothingToCancel,
        "There is no registration in progress. Use /start to begin.",
    ),
    (En, StartHint, "Use /start to begin registration."),
    (
        En,
        Help,
        "🤖 <b>Worker registration bot</b>\n\n\
         <b>Commands:</b>\n\
         /start - Start registration\n\
         /register - Start registration (alternative)\n\
         /cancel - Cancel the current registration\n\
         /help - Show this message\n\n\
         <b>Registration steps:</b>\n\
         1️⃣ Choose a language\n\
         2️⃣ Enter your full name\n\
         3️⃣ Enter your age ({min}-{max} years)\n\
         4️⃣ Enter your phone number\n\
         5️⃣ Confirm your details\n\n\
         ❓ If you have questions, contact an administrator.",
    ),
    (
        En,
        StatsDenied,
        "❌ You do not have permission to run this command.",
    ),
    (
        En,
        StatsReport,
        "📊 <b>Registration statistics</b>\n\n\
         👥 <b>Total:</b> {total}\n\
         📅 <b>Today:</b> {today}\n\
         📅 <b>This week:</b> {week}\n\
         📅 <b>This month:</b> {month}",
    ),
    (En, StatsFailed, "❌ Failed to load statistics."),
    (
        En,
        AdminNotification,
        "🆕 <b>New worker registration</b>\n\n\
         👤 <b>Name:</b> {name}\n\
         🎂 <b>Age:</b> {age}\n\
         📞 <b>Phone:</b> {phone}\n\
         📱 <b>Telegram:</b> @{username} (ID: {user_id})\n\
         📅 <b>Registered at:</b> {registered_at}",
    ),
    // ── Ukrainian ───────────────────────────────────────────────────
    (Uk, ChooseLanguage, CHOOSE_LANGUAGE),
    (
        Uk,
        Welcome,
        "👋 Ласкаво просимо до системи реєстрації працівників!\n\n\
         Я допоможу вам зареєструватися. Це займе лише кілька хвилин.\n\n\
         Для початку введіть ваше повне ім'я:",
    ),
    (
        Uk,
        NameInvalid,
        "❌ Ім'я має містити щонайменше 2 символи і складатися лише з літер, пробілів, \
         дефісів або апострофів. Спробуйте ще раз:",
    ),
    (
        Uk,
        NameAccepted,
        "✅ Чудово, {name}!\n\nТепер вкажіть ваш вік (від {min} до {max} років):",
    ),
    (
        Uk,
        AgeInvalid,
        "❌ Вік має бути цілим числом від {min} до {max}. Спробуйте ще раз:",
    ),
    (
        Uk,
        AgeAccepted,
        "✅ Вік прийнято!\n\nТепер введіть ваш номер телефону у форматі:\n\
         +380XXXXXXXXX або 0XXXXXXXXX",
    ),
    (
        Uk,
        PhoneInvalid,
        "❌ Некоректний номер телефону.\nВикористовуйте формат +380XXXXXXXXX або 0XXXXXXXXX\n\
         Спробуйте ще раз:",
    ),
    (
        Uk,
        ConfirmSummary,
        "📋 Будь ласка, перевірте введені дані:\n\n\
         👤 Ім'я: {name}\n\
         🎂 Вік: {age}\n\
         📞 Телефон: {phone} ({phone_local})\n\n\
         Все вірно? Надішліть 'так' для підтвердження або 'ні' для повторного введення.",
    ),
    (
        Uk,
        ConfirmClarify,
        "❓ Будь ласка, відповідайте 'так' для підтвердження або 'ні' для повторного введення:",
    ),
    (
        Uk,
        Success,
        "✅ Реєстрацію успішно завершено!\n\n\
         Ваші дані збережено. Найближчим часом з вами зв'яжеться наш HR-менеджер.\n\n\
         Дякуємо за реєстрацію! 🎉",
    ),
    (
        Uk,
        SubmitFailed,
        "❌ Сталася технічна помилка. Будь ласка, спробуйте пізніше.",
    ),
    (
        Uk,
        Restart,
        "🔄 Добре, почнімо спочатку.\nВведіть ваше повне ім'я:",
    ),
    (
        Uk,
        Cancelled,
        "❌ Реєстрацію скасовано.\nЯкщо передумаєте, скористайтеся командою /start.",
    ),
    (
        Uk,
        NothingToCancel,
        "Немає активної реєстрації. Скористайтеся /start, щоб почати.",
    ),
    (Uk, StartHint, "Скористайтеся /start, щоб почати реєстрацію."),
    (
        Uk,
        Help,
        "🤖 <b>Бот реєстрації працівників</b>\n\n\
         <b>Доступні команди:</b>\n\
         /start - Почати реєстрацію\n\
         /register - Почати реєстрацію (альтернатива)\n\
         /cancel - Скасувати поточну реєстрацію\n\
         /help - Показати це повідомлення\n\n\
         <b>Процес реєстрації:</b>\n\
         1️⃣ Оберіть мову\n\
         2️⃣ Введіть повне ім'я\n\
         3️⃣ Вкажіть вік ({min}-{max} років)\n\
         4️⃣ Введіть номер телефону\n\
         5️⃣ Підтвердіть дані\n\n\
         ❓ Якщо у вас виникли питання, зверніться до адміністратора.",
    ),
    (
        Uk,
        StatsDenied,
        "❌ У вас немає прав для виконання цієї команди.",
    ),
    (
        Uk,
        StatsReport,
        "📊 <b>Статистика реєстрацій</b>\n\n\
         👥 <b>Усього:</b> {total}\n\
         📅 <b>Сьогодні:</b> {today}\n\
         📅 <b>Цього тижня:</b> {week}\n\
         📅 <b>Цього місяця:</b> {month}",
    ),
    (Uk, StatsFailed, "❌ Помилка під час отримання статистики."),
    (
        Uk,
        AdminNotification,
        "🆕 <b>Нова реєстрація працівника</b>\n\n\
         👤 <b>Ім'я:</b> {name}\n\
         🎂 <b>Вік:</b> {age}\n\
         📞 <b>Телефон:</b> {phone}\n\
         📱 <b>Telegram:</b> @{username} (ID: {user_id})\n\
         📅 <b>Дата реєстрації:</b> {registered_at}",
    ),
    // ── Russian ─────────────────────────────────────────────────────
    (Ru, ChooseLanguage, CHOOSE_LANGUAGE),
    (
        Ru,
        Welcome,
        "👋 Добро пожаловать в систему регистрации сотрудников!\n\n\
         Я помогу вам зарегистрироваться. Процесс займет всего несколько минут.\n\n\
         Для начала, пожалуйста, введите ваше полное имя:",
    ),
    (
        Ru,
        NameInvalid,
        "❌ Имя должно содержать минимум 2 символа и состоять только из букв, пробелов, \
         дефисов или апострофов. Попробуйте еще раз:",
    ),
    (
        Ru,
        NameAccepted,
        "✅ Отлично, {name}!\n\nТеперь укажите ваш возраст (от {min} до {max} лет):",
    ),
    (
        Ru,
        AgeInvalid,
        "❌ Возраст должен быть целым числом от {min} до {max}. Попробуйте еще раз:",
    ),
    (
        Ru,
        AgeAccepted,
        "✅ Возраст принят!\n\nТеперь введите ваш номер телефона в формате:\n\
         +380XXXXXXXXX или 0XXXXXXXXX",
    ),
    (
        Ru,
        PhoneInvalid,
        "❌ Некорректный формат номера телефона.\n\
         Используйте формат +380XXXXXXXXX или 0XXXXXXXXX\nПопробуйте еще раз:",
    ),
    (
        Ru,
        ConfirmSummary,
        "📋 Пожалуйста, проверьте введенные данные:\n\n\
         👤 Имя: {name}\n\
         🎂 Возраст: {age}\n\
         📞 Телефон: {phone} ({phone_local})\n\n\
         Все верно? Отправьте 'да' для подтверждения или 'нет' для повторного ввода.",
    ),
    (
        Ru,
        ConfirmClarify,
        "❓ Пожалуйста, ответьте 'да' для подтверждения или 'нет' для повторного ввода:",
    ),
    (
        Ru,
        Success,
        "✅ Регистрация успешно завершена!\n\n\
         Ваши данные сохранены в системе. В ближайшее время с вами свяжется наш HR-менеджер.\n\n\
         Спасибо за регистрацию! 🎉",
    ),
    (
        Ru,
        SubmitFailed,
        "❌ Произошла техническая ошибка. Пожалуйста, попробуйте позже.",
    ),
    (
        Ru,
        Restart,
        "🔄 Хорошо, давайте начнем заново.\nВведите ваше полное имя:",
    ),
    (
        Ru,
        Cancelled,
        "❌ Регистрация отменена.\nЕсли передумаете, используйте команду /start для начала регистрации.",
    ),
    (
        Ru,
        NothingToCancel,
        "Нет активной регистрации. Используйте /start, чтобы начать.",
    ),
    (Ru, StartHint, "Используйте /start, чтобы начать регистрацию."),
    (
        Ru,
        Help,
        "🤖 <b>Бот регистрации сотрудников</b>\n\n\
         <b>Доступные команды:</b>\n\
         /start - Начать регистрацию\n\
         /register - Начать регистрацию (альтернатива)\n\
         /cancel - Отменить текущую регистрацию\n\
         /help - Показать это сообщение\n\n\
         <b>Процесс регистрации:</b>\n\
         1️⃣ Выберите язык\n\
         2️⃣ Введите полное имя\n\
         3️⃣ Укажите возраст ({min}-{max} лет)\n\
         4️⃣ Введите номер телефона\n\
         5️⃣ Подтвердите данные\n\n\
         ❓ Если у вас возникли вопросы, обратитесь к администратору.",
    ),
    (
        Ru,
        StatsDenied,
        "❌ У вас нет прав для выполнения этой команды.",
    ),
    (
        Ru,
        StatsReport,
        "📊 <b>Статистика регистраций</b>\n\n\
         👥 <b>Всего регистраций:</b> {total}\n\
         📅 <b>За сегодня:</b> {today}\n\
         📅 <b>За эту неделю:</b> {week}\n\
         📅 <b>За этот месяц:</b> {month}",
    ),
    (Ru, StatsFailed, "❌ Ошибка при получении статистики."),
    (
        Ru,
        AdminNotification,
        "🆕 <b>Новая регистрация сотрудника</b>\n\n\
         👤 <b>Имя:</b> {name}\n\
         🎂 <b>Возраст:</b> {age}\n\
         📞 <b>Телефон:</b> {phone}\n\
         📱 <b>Telegram:</b> @{username} (ID: {user_id})\n\
         📅 <b>Дата регистрации:</b> {registered_at}",
    ),
];
